//! The relationship engine: bounded pairwise detection, a typed edge
//! store, conflict/cluster derivation, and decay prediction (spec §4.5).
//!
//! Grounded on the teacher's `neuroscience/predictive_retrieval.rs` and
//! `consolidation/sleep.rs` for the "small pure-function scoring core plus
//! a thin stateful wrapper" shape, and on `memory/mod.rs::KnowledgeEdge`
//! for the edge record itself.

pub mod conflicts;
pub mod decay;
pub mod detectors;
pub mod graph;
pub mod types;
pub mod validation_queue;

use std::num::NonZeroUsize;

use chrono::Utc;
use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tracing::{instrument, warn};
use uuid::Uuid;

pub use decay::DecayConfig;
pub use types::{
    ChangeType, ConflictResolution, ConflictSeverity, DecayPrediction, DecayRecommendation, GraphNode,
    KnowledgeGraph, MemoryConflict, MemoryRelationship, MemoryVersion, RelationshipSource, RelationshipSuggestion,
    RelationshipType, SuggestionStatus,
};
pub use validation_queue::{UserPreferences, ValidationAction, ValidationQueue};

use crate::config::RelationshipConfig;
use crate::item::MemoryItem;

const CACHE_CAPACITY: usize = 512;

/// Bounded pairwise relationship detector plus the edge store it feeds.
pub struct RelationshipEngine {
    config: RelationshipConfig,
    decay_config: DecayConfig,
    edges: RwLock<Vec<MemoryRelationship>>,
    versions: RwLock<Vec<MemoryVersion>>,
    queue: RwLock<ValidationQueue>,
    cache: Mutex<LruCache<(Uuid, Vec<Uuid>), Vec<MemoryRelationship>>>,
}

impl RelationshipEngine {
    pub fn new(config: RelationshipConfig) -> Self {
        Self {
            config,
            decay_config: DecayConfig::default(),
            edges: RwLock::new(Vec::new()),
            versions: RwLock::new(Vec::new()),
            queue: RwLock::new(ValidationQueue::new()),
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    /// Run bounded pairwise detection for a freshly admitted item against
    /// a candidate set of existing items (spec §4.5.1).
    #[instrument(skip(self, item_new, candidates))]
    pub async fn detect(&self, item_new: &MemoryItem, candidates: &[MemoryItem]) -> Vec<MemoryRelationship> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut filtered: Vec<&MemoryItem> = candidates
            .iter()
            .filter(|c| c.metadata.priority >= 3 && c.id != item_new.id)
            .collect();
        filtered.truncate(self.config.max_candidates);

        let mut candidate_ids: Vec<Uuid> = filtered.iter().map(|c| c.id).collect();
        candidate_ids.sort();
        let cache_key = (item_new.id, candidate_ids);

        {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                return cached
                    .iter()
                    .filter(|e| e.confidence >= self.config.min_confidence)
                    .cloned()
                    .collect();
            }
        }

        let mut found: Vec<MemoryRelationship> = Vec::new();
        for batch in filtered.chunks(self.config.batch_size) {
            for candidate in batch {
                let edges = detectors::detect_all(item_new, candidate);
                found.extend(edges.into_iter().filter(|e| e.confidence >= self.config.min_confidence));
            }
        }

        found.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        found.truncate(self.config.max_per_memory);

        {
            let mut cache = self.cache.lock().await;
            cache.put(cache_key, found.clone());
        }

        if !found.is_empty() {
            let mut edges = self.edges.write().await;
            edges.extend(found.clone());
        }

        found
    }

    /// Drop every edge touching `id` (spec §3: "deleted when either
    /// endpoint is deleted").
    pub async fn drop_edges_for(&self, id: Uuid) {
        let mut edges = self.edges.write().await;
        let before = edges.len();
        edges.retain(|e| e.source_id != id && e.target_id != id);
        if edges.len() != before {
            warn!(memory_id = %id, dropped = before - edges.len(), "dropped relationship edges for deleted memory");
        }
    }

    pub async fn edges_for(&self, id: Uuid) -> Vec<MemoryRelationship> {
        self.edges
            .read()
            .await
            .iter()
            .filter(|e| e.source_id == id || e.target_id == id)
            .cloned()
            .collect()
    }

    pub async fn all_edges(&self) -> Vec<MemoryRelationship> {
        self.edges.read().await.clone()
    }

    pub async fn append_version(&self, version: MemoryVersion) {
        self.versions.write().await.push(version);
    }

    pub async fn versions_for(&self, memory_id: Uuid) -> Vec<MemoryVersion> {
        self.versions
            .read()
            .await
            .iter()
            .filter(|v| v.memory_id == memory_id)
            .cloned()
            .collect()
    }

    /// Build the on-demand knowledge graph view (spec §4.5.3).
    pub async fn knowledge_graph(&self, top_k: usize) -> KnowledgeGraph {
        let edges = self.edges.read().await;
        graph::build(&edges, top_k)
    }

    /// Evaluate every pair in `items` for a conflict (spec §4.5.4). Callers
    /// are expected to pass a bounded, already-filtered item set — this is
    /// O(n^2) and is meant for per-layer or per-project conflict sweeps,
    /// not whole-engine scans.
    pub async fn conflicts(&self, items: &[MemoryItem]) -> Vec<MemoryConflict> {
        let edges = self.edges.read().await;
        let mut found = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let pair_edges: Vec<MemoryRelationship> = edges
                    .iter()
                    .filter(|e| {
                        (e.source_id == items[i].id && e.target_id == items[j].id)
                            || (e.source_id == items[j].id && e.target_id == items[i].id)
                    })
                    .cloned()
                    .collect();
                if let Some(conflict) = conflicts::evaluate(&items[i], &items[j], &pair_edges) {
                    found.push(conflict);
                }
            }
        }
        found
    }

    /// Predict decay posture for `item` using the edge count already on
    /// file for it (spec §4.5.5).
    pub async fn decay(&self, item: &MemoryItem, validation_score: f32, content_relevance: f32) -> DecayPrediction {
        let relationship_count = self.edges_for(item.id).await.len();
        decay::predict(
            item,
            relationship_count,
            validation_score,
            content_relevance,
            &self.decay_config,
            Utc::now(),
        )
    }

    pub async fn queue_suggestion(&self, suggestion: RelationshipSuggestion) {
        self.queue.write().await.enqueue(suggestion);
    }

    pub async fn validation_queue(&self) -> tokio::sync::RwLockWriteGuard<'_, ValidationQueue> {
        self.queue.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;

    fn item(content: &str, priority: u8) -> MemoryItem {
        MemoryItem::new_now(content.to_string(), ItemMetadata::new("general", priority, "test"))
    }

    #[tokio::test]
    async fn detect_filters_low_priority_candidates() {
        let engine = RelationshipEngine::new(RelationshipConfig::default());
        let new_item = item("see https://example.com/doc", 5);
        let low_priority = item("https://example.com/doc has details", 1);

        let edges = engine.detect(&new_item, &[low_priority]).await;
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn detect_caches_repeated_candidate_sets() {
        let engine = RelationshipEngine::new(RelationshipConfig::default());
        let new_item = item("see https://example.com/doc", 5);
        let candidate = item("https://example.com/doc has details", 5);

        let first = engine.detect(&new_item, &[candidate.clone()]).await;
        let second = engine.detect(&new_item, &[candidate]).await;
        assert_eq!(first.len(), second.len());
        assert!(!first.is_empty());
    }

    #[tokio::test]
    async fn drop_edges_for_removes_touching_edges() {
        let engine = RelationshipEngine::new(RelationshipConfig::default());
        let new_item = item("see https://example.com/doc", 5);
        let candidate = item("https://example.com/doc has details", 5);
        engine.detect(&new_item, &[candidate.clone()]).await;

        assert!(!engine.edges_for(new_item.id).await.is_empty());
        engine.drop_edges_for(new_item.id).await;
        assert!(engine.edges_for(new_item.id).await.is_empty());
    }

    #[tokio::test]
    async fn decay_reflects_relationship_count() {
        let engine = RelationshipEngine::new(RelationshipConfig::default());
        let new_item = item("see https://example.com/doc", 5);
        let candidate = item("https://example.com/doc has details", 5);
        engine.detect(&new_item, &[candidate]).await;

        let prediction = engine.decay(&new_item, 0.5, 0.5).await;
        assert!(prediction.rel_strength > 0.0);
    }
}
