//! Hierarchical, tenant-scoped memory engine.
//!
//! Items are admitted into one of four layers (session, project, global,
//! temporal), each independently indexed, capacity-bounded and
//! persisted. The router decides admission and fans queries out across
//! layers; the relationship engine links items together and tracks their
//! decay; the tenant overlay stamps and filters everything by caller
//! identity. See `SPEC_FULL.md` in the repository root for the full
//! behavioral contract.
//!
//! Module layout mirrors the teacher's: one file per concern, a `Config`
//! struct per tunable subsystem, `thiserror` at the leaves widening into
//! [`error::EngineError`] at the boundary.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod item;
pub mod layer;
pub mod relationship;
pub mod router;
pub mod tenant;
pub mod validation;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use config::EngineConfig;
pub use embeddings::EmbeddingProvider;
pub use error::{EngineError, Result};
pub use item::{ItemMetadata, MemoryItem, MemoryLayer, PartialItem, Visibility};
pub use layer::{SearchQuery, SearchResult, TemporalContext, TemporalPattern, SNAPSHOT_FORMAT_VERSION};
pub use relationship::{
    DecayPrediction, DecayRecommendation, KnowledgeGraph, MemoryConflict, MemoryRelationship, MemoryVersion,
    RelationshipEngine, RelationshipSuggestion, RelationshipType,
};
pub use tenant::{AuditEvent, AuditSeverity, TenantContext};

use tenant::TenantOverlay;

/// Crate version, also embedded in snapshot headers (see `layer::snapshot`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level handle to a running engine. Thin wrapper over a
/// [`TenantOverlay`] exposing the public operations named in the
/// interface spec; construction and persistence concerns stay in
/// `router`/`layer`, access control in `tenant`.
pub struct Engine {
    overlay: TenantOverlay,
}

impl Engine {
    /// Build a fresh, empty engine from `config`. No snapshot is read;
    /// use [`Engine::load`] to resume from a prior `data_dir`.
    pub fn new(config: &EngineConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            overlay: TenantOverlay::new(config, embedder),
        }
    }

    /// Build an engine and load every layer's snapshot from `config.data_dir`.
    pub async fn load(config: &EngineConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            overlay: TenantOverlay::load(config, embedder).await,
        }
    }

    /// `store(content, metadata, ctx)` (spec §2/§4.7). Returns `Ok(None)`
    /// rather than an error when the caller has no context and
    /// `require_auth` is set; see [`tenant::TenantOverlay::store`].
    pub async fn store(
        &self,
        content: String,
        metadata: ItemMetadata,
        ctx: Option<&TenantContext>,
    ) -> Result<Option<MemoryItem>> {
        self.overlay.store(content, metadata, ctx).await
    }

    /// `search(query, category, tags, ctx)`: analyzes the query, fans out
    /// across the candidate layers, merges and re-ranks, then drops any
    /// result outside the caller's tenant.
    pub async fn search(
        &self,
        query_text: &str,
        category: Option<String>,
        tags: Vec<String>,
        ctx: Option<&TenantContext>,
    ) -> Vec<SearchResult> {
        self.overlay.search(query_text, category, tags, ctx).await
    }

    pub async fn retrieve(&self, layer: MemoryLayer, id: Uuid, ctx: Option<&TenantContext>) -> Option<MemoryItem> {
        self.overlay.retrieve(layer, id, ctx).await
    }

    pub async fn update(
        &self,
        layer: MemoryLayer,
        id: Uuid,
        patch: PartialItem,
        ctx: Option<&TenantContext>,
    ) -> Result<Option<MemoryItem>> {
        self.overlay.update(layer, id, patch, ctx).await
    }

    pub async fn delete(&self, layer: MemoryLayer, id: Uuid, ctx: Option<&TenantContext>) -> bool {
        self.overlay.delete(layer, id, ctx).await
    }

    /// Relationship edges touching `id`, unfiltered by tenant — callers
    /// that need tenant-scoped relationship browsing should first confirm
    /// visibility of `id` via [`Engine::retrieve`].
    pub async fn relationships_for(&self, id: Uuid) -> Vec<MemoryRelationship> {
        self.overlay.router().relationships_for(id).await
    }

    /// On-demand knowledge graph view over every relationship edge
    /// recorded so far (spec §4.5.3).
    pub async fn knowledge_graph(&self, top_k: usize) -> KnowledgeGraph {
        self.overlay.router().relationships().knowledge_graph(top_k).await
    }

    /// Detected conflicts touching `id`, evaluated against every other
    /// item in the same layer (spec §4.5.4's locality heuristic, same as
    /// the one `store` uses for relationship detection candidates).
    pub async fn conflicts_for(&self, layer: MemoryLayer, id: Uuid) -> Vec<MemoryConflict> {
        let Some(item) = self.overlay.router().retrieve(layer, id).await else {
            return Vec::new();
        };
        let mut pool = self.overlay.router().layer(layer).export().await;
        if !pool.iter().any(|candidate| candidate.id == id) {
            pool.push(item.clone());
        }
        self.overlay
            .router()
            .relationships()
            .conflicts(&pool)
            .await
            .into_iter()
            .filter(|c| c.memory_a == id || c.memory_b == id)
            .collect()
    }

    /// Decay prediction for a single item (spec §4.5.5). `validation_score`
    /// and `content_relevance` are `0.0` here — an item with no
    /// user-confirmed edges and no recent search hit has earned neither,
    /// per §4.5.5's definitions. Callers that track per-item validation
    /// history or recent search scores should call
    /// [`relationship::RelationshipEngine::decay`] directly with the real
    /// values instead.
    pub async fn decay_for(&self, layer: MemoryLayer, id: Uuid) -> Option<DecayPrediction> {
        let item = self.overlay.router().retrieve(layer, id).await?;
        Some(self.overlay.router().relationships().decay(&item, 0.0, 0.0).await)
    }

    /// `getTemporalContext(layer, t, window_minutes, k)` (spec §4.1.5).
    pub async fn temporal_context(
        &self,
        layer: MemoryLayer,
        t: DateTime<Utc>,
        window_minutes: i64,
        k: usize,
    ) -> TemporalContext {
        self.overlay.router().temporal_context(layer, t, window_minutes, k).await
    }

    /// `getTemporalSimilarities(layer, reference, k)` (spec §4.1.5).
    pub async fn temporal_similarities(&self, layer: MemoryLayer, reference: DateTime<Utc>, k: usize) -> Vec<Uuid> {
        self.overlay.router().temporal_similarities(layer, reference, k).await
    }

    /// Pattern analysis over a layer's creation times (spec §4.1.2).
    pub async fn temporal_patterns(&self, layer: MemoryLayer) -> Vec<TemporalPattern> {
        self.overlay.router().temporal_patterns(layer).await
    }

    pub async fn recent_audit_events(&self, ctx: &TenantContext, limit: usize) -> Vec<AuditEvent> {
        self.overlay.recent_audit_events(ctx, limit).await
    }

    /// Runs TTL expiry and temporal compression across every layer;
    /// returns the total number of items removed.
    pub async fn cleanup(&self) -> usize {
        self.overlay.router().cleanup_all().await
    }

    pub async fn close(&self) -> Result<()> {
        self.overlay.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> (EngineConfig, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.data_dir = dir.path().to_path_buf();
        (config, dir)
    }

    #[tokio::test]
    async fn store_then_retrieve_through_the_public_surface() {
        let (config, _dir) = test_config();
        let engine = Engine::new(&config, None);
        let ctx = TenantContext::new("acme", "alice");
        let item = engine
            .store(
                "working on the login bug".into(),
                ItemMetadata::new("current-work", 5, "user"),
                Some(&ctx),
            )
            .await
            .unwrap()
            .unwrap();

        let found = engine.retrieve(MemoryLayer::Session, item.id, Some(&ctx)).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn decay_for_missing_item_is_none() {
        let (config, _dir) = test_config();
        let engine = Engine::new(&config, None);
        assert!(engine.decay_for(MemoryLayer::Project, Uuid::new_v4()).await.is_none());
    }
}
