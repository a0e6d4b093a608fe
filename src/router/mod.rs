//! The router: admission, query analysis, parallel fan-out and merge
//! (spec §4.4). New relative to the teacher (`vestige-core` is single-
//! tier); grounded on `search/hybrid.rs` for the "`*Config` plus pure
//! scoring functions behind a thin struct" shape and on the teacher's
//! `Storage` for the `&self`-only, lock-free-at-this-layer API (the
//! locking lives one level down, inside each `Layer`).

pub mod admission;
pub mod analyze;
pub mod merge;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{instrument, warn};
use uuid::Uuid;

pub use admission::determine_storage_layer;
pub use analyze::analyze;

use crate::config::{EngineConfig, RoutingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::item::{ItemMetadata, MemoryItem, MemoryLayer, PartialItem};
use crate::layer::{Layer, SearchQuery, SearchResult};
use crate::relationship::{MemoryRelationship, RelationshipEngine};

/// Owns all four layers and the relationship engine; decides admission,
/// fans out search, merges and ranks.
pub struct Router {
    session: Arc<Layer>,
    project: Arc<Layer>,
    global: Arc<Layer>,
    temporal: Arc<Layer>,
    routing: RoutingConfig,
    relationships: Arc<RelationshipEngine>,
}

impl Router {
    pub fn new(config: &EngineConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            session: Arc::new(Layer::new(
                MemoryLayer::Session,
                config.session.clone(),
                config.data_dir.join("session"),
                None,
                None,
            )),
            project: Arc::new(Layer::new(
                MemoryLayer::Project,
                config.project.clone(),
                config.data_dir.join("project"),
                None,
                None,
            )),
            global: Arc::new(Layer::new(
                MemoryLayer::Global,
                config.global.clone(),
                config.data_dir.join("global"),
                Some(config.vector_index),
                embedder,
            )),
            temporal: Arc::new(Layer::new(
                MemoryLayer::Temporal,
                config.temporal.clone(),
                config.data_dir.join("temporal"),
                None,
                None,
            )),
            routing: config.routing.clone(),
            relationships: Arc::new(RelationshipEngine::new(config.relationships.clone())),
        }
    }

    /// Construct and load every layer's snapshot from disk.
    pub async fn load(config: &EngineConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            session: Arc::new(Layer::load(
                MemoryLayer::Session,
                config.session.clone(),
                config.data_dir.join("session"),
                None,
                None,
            )
            .await),
            project: Arc::new(
                Layer::load(
                    MemoryLayer::Project,
                    config.project.clone(),
                    config.data_dir.join("project"),
                    None,
                    None,
                )
                .await,
            ),
            global: Arc::new(
                Layer::load(
                    MemoryLayer::Global,
                    config.global.clone(),
                    config.data_dir.join("global"),
                    Some(config.vector_index),
                    embedder,
                )
                .await,
            ),
            temporal: Arc::new(
                Layer::load(
                    MemoryLayer::Temporal,
                    config.temporal.clone(),
                    config.data_dir.join("temporal"),
                    None,
                    None,
                )
                .await,
            ),
            routing: config.routing.clone(),
            relationships: Arc::new(RelationshipEngine::new(config.relationships.clone())),
        }
    }

    pub fn layer(&self, kind: MemoryLayer) -> &Arc<Layer> {
        match kind {
            MemoryLayer::Session => &self.session,
            MemoryLayer::Project => &self.project,
            MemoryLayer::Global => &self.global,
            MemoryLayer::Temporal => &self.temporal,
        }
    }

    pub fn relationships(&self) -> &Arc<RelationshipEngine> {
        &self.relationships
    }

    /// `store(content, meta)` (spec §2): admission picks a layer, the
    /// layer writes the item, then the relationship engine runs bounded
    /// detection against the admitting layer's current contents.
    #[instrument(skip(self, content, metadata))]
    pub async fn store(&self, content: String, metadata: ItemMetadata) -> Result<MemoryItem> {
        let target = determine_storage_layer(&content, &metadata);
        let layer = self.layer(target);
        let item = layer.store(content, metadata).await?;

        let candidates = layer.export().await;
        self.relationships.detect(&item, &candidates).await;

        Ok(item)
    }

    /// `search(query, limit)` (spec §4.4): analyze the query's candidate
    /// layer set, fan out concurrently, merge by id, re-rank, truncate.
    #[instrument(skip(self, query_text))]
    pub async fn search(&self, query_text: &str, category: Option<String>, tags: Vec<String>) -> Vec<SearchResult> {
        let mut candidate_layers = analyze::analyze(query_text);

        let per_layer_limit = self.routing.max_results;
        let mut join_set: JoinSet<(MemoryLayer, Result<Vec<SearchResult>>)> = JoinSet::new();
        for kind in candidate_layers.clone() {
            let layer = Arc::clone(self.layer(kind));
            let query = SearchQuery {
                text: query_text.to_string(),
                limit: per_layer_limit,
                category: category.clone(),
                tags: tags.clone(),
            };
            join_set.spawn(async move { (kind, layer.search(&query).await) });
        }

        let mut hits: Vec<Vec<SearchResult>> = Vec::new();
        while let Some(outcome) = join_set.join_next().await {
            match outcome {
                Ok((_kind, Ok(results))) => hits.push(results),
                Ok((kind, Err(e))) => {
                    warn!(layer = %kind, error = %e, "layer search failed, treated as empty");
                }
                Err(e) => {
                    warn!(error = %e, "layer search task panicked, treated as empty");
                }
            }
        }

        let total: usize = hits.iter().map(|h| h.len()).sum();
        if self.routing.temporal_fallback
            && total < self.routing.min_results
            && !candidate_layers.contains(&MemoryLayer::Temporal)
        {
            candidate_layers.insert(MemoryLayer::Temporal);
            let query = SearchQuery {
                text: query_text.to_string(),
                limit: per_layer_limit,
                category: category.clone(),
                tags: tags.clone(),
            };
            if let Ok(results) = self.temporal.search(&query).await {
                hits.push(results);
            }
        }

        merge::merge_and_rank(hits, &self.routing.weights, self.routing.max_results)
    }

    pub async fn retrieve(&self, kind: MemoryLayer, id: Uuid) -> Option<MemoryItem> {
        self.layer(kind).retrieve(id).await
    }

    /// Retrieve by id without knowing which layer holds it.
    pub async fn retrieve_any(&self, id: Uuid) -> Option<(MemoryLayer, MemoryItem)> {
        for kind in MemoryLayer::ALL {
            if let Some(item) = self.layer(kind).retrieve(id).await {
                return Some((kind, item));
            }
        }
        None
    }

    pub async fn update(&self, kind: MemoryLayer, id: Uuid, patch: PartialItem) -> Result<Option<MemoryItem>> {
        self.layer(kind).update(id, patch).await
    }

    pub async fn delete(&self, kind: MemoryLayer, id: Uuid) -> bool {
        let removed = self.layer(kind).delete(id).await;
        if removed {
            self.relationships.drop_edges_for(id).await;
        }
        removed
    }

    pub async fn relationships_for(&self, id: Uuid) -> Vec<MemoryRelationship> {
        self.relationships.edges_for(id).await
    }

    /// `getTemporalContext(layer, t, window_minutes, k)` (spec §4.1.5).
    pub async fn temporal_context(
        &self,
        kind: MemoryLayer,
        t: chrono::DateTime<chrono::Utc>,
        window_minutes: i64,
        k: usize,
    ) -> crate::layer::TemporalContext {
        self.layer(kind).temporal_context(t, window_minutes, k).await
    }

    /// `getTemporalSimilarities(layer, reference, k)` (spec §4.1.5).
    pub async fn temporal_similarities(
        &self,
        kind: MemoryLayer,
        reference: chrono::DateTime<chrono::Utc>,
        k: usize,
    ) -> Vec<Uuid> {
        self.layer(kind).temporal_similarities(reference, k).await
    }

    /// Pattern analysis over a layer's creation times (spec §4.1.2).
    pub async fn temporal_patterns(&self, kind: MemoryLayer) -> Vec<crate::layer::TemporalPattern> {
        self.layer(kind).temporal_patterns().await
    }

    pub async fn cleanup_all(&self) -> usize {
        let mut total = 0;
        for kind in MemoryLayer::ALL {
            total += self.layer(kind).cleanup().await;
        }
        total
    }

    pub async fn close(&self) -> Result<()> {
        for kind in MemoryLayer::ALL {
            self.layer(kind).close().await?;
        }
        Ok(())
    }
}
