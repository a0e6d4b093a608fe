//! Memory layer: composes the item store, lexical index, temporal index
//! and (for the global layer) a vector index into one capacity/TTL-bounded
//! tier with its own snapshot file.
//!
//! Grounded on the teacher's `Storage` (interior mutability behind a
//! lock, `&self`-only methods) generalized across four tiers instead of
//! one SQLite-backed store, and on `search/hybrid.rs`'s free-function
//! scoring style for the search path.

pub mod lexical;
pub mod score;
pub mod snapshot;
pub mod store;
pub mod temporal;
pub mod vector;

pub use lexical::LexicalIndex;
pub use snapshot::SNAPSHOT_FORMAT_VERSION;
pub use store::ItemStore;
pub use temporal::{TemporalContext, TemporalIndex, TemporalPattern, TemporalPatternKind};
pub use vector::{IndexState, VectorIndex, VectorIndexError, VectorIndexStats};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::{LayerConfig, VectorIndexSettings};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Diagnostics, EngineError, Result};
use crate::item::{ItemMetadata, MemoryItem, MemoryLayer, PartialItem};
use crate::validation::{self, validate_content};

/// One ranked hit returned from a layer's `search`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub item: MemoryItem,
    pub score: f32,
    pub source_layer: MemoryLayer,
    pub explanation: String,
}

/// A query against a single layer.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub limit: usize,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl SearchQuery {
    pub fn has_filters(&self) -> bool {
        self.category.is_some() || !self.tags.is_empty()
    }

    fn matches_filters(&self, item: &MemoryItem) -> bool {
        if let Some(category) = &self.category {
            if &item.metadata.category != category {
                return false;
            }
        }
        self.tags.iter().all(|t| item.metadata.tags.contains(t))
    }
}

#[derive(Debug, Clone)]
pub struct LayerStats {
    pub layer: MemoryLayer,
    pub total_items: usize,
    pub total_bytes: usize,
    pub max_items: usize,
    pub max_bytes: u64,
    pub dirty: bool,
}

struct Inner {
    store: ItemStore,
    lexical: LexicalIndex,
    temporal: TemporalIndex,
}

/// A single tier: Session, Project, Global or Temporal.
pub struct Layer {
    kind: MemoryLayer,
    config: LayerConfig,
    data_dir: PathBuf,
    inner: RwLock<Inner>,
    vector: Option<RwLock<VectorIndex>>,
    vector_settings: Option<VectorIndexSettings>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    dirty: AtomicBool,
}

/// Historical-compression threshold for the temporal layer's `cleanup`
/// (spec §4.1.5: "older than a historical threshold, default 2 years,
/// with low access"). The spec does not pin an exact access-count cutoff
/// for "low access"; this implementation treats fewer than 5 accesses as
/// low, recorded as a decision in the grounding ledger.
const HISTORICAL_THRESHOLD_DAYS: i64 = 2 * 365;
const LOW_ACCESS_THRESHOLD: u64 = 5;

impl Layer {
    pub fn new(
        kind: MemoryLayer,
        config: LayerConfig,
        data_dir: PathBuf,
        vector_settings: Option<VectorIndexSettings>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let vector = if kind.has_vector_index() {
            let dim = embedder.as_ref().map(|e| e.dimension()).unwrap_or(768);
            let settings = vector_settings.unwrap_or_default();
            Some(RwLock::new(VectorIndex::new(dim, settings.n_ivf, settings.nlist, settings.nprobe)))
        } else {
            None
        };
        Self {
            kind,
            config,
            data_dir,
            inner: RwLock::new(Inner {
                store: ItemStore::new(),
                lexical: LexicalIndex::new(),
                temporal: TemporalIndex::new(),
            }),
            vector,
            vector_settings,
            embedder,
            dirty: AtomicBool::new(false),
        }
    }

    /// Construct and immediately attempt to load the layer's snapshot.
    /// A missing or unreadable snapshot is non-fatal: the layer starts
    /// empty and the failure is logged (spec §7).
    pub async fn load(
        kind: MemoryLayer,
        config: LayerConfig,
        data_dir: PathBuf,
        vector_settings: Option<VectorIndexSettings>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let layer = Self::new(kind, config, data_dir.clone(), vector_settings, embedder);
        match snapshot::load_latest_items(&data_dir) {
            Ok(Some(snap)) => {
                if let Err(e) = layer.import(snap.items).await {
                    warn!(layer = %kind, error = %e, "failed to import loaded snapshot, starting empty");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(layer = %kind, error = %e, "snapshot load failed, starting layer empty"),
        }
        if let Some(vector) = &layer.vector {
            let path = data_dir.join("vectors").join("index.json");
            if path.exists() {
                match VectorIndex::load(&path) {
                    Ok(loaded) => *vector.write().await = loaded,
                    Err(e) => warn!(layer = %kind, error = %e, "vector index load failed"),
                }
            }
        }
        layer.dirty.store(false, Ordering::Relaxed);
        layer
    }

    pub fn kind(&self) -> MemoryLayer {
        self.kind
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    /// `store(partial_item)` (spec §4.1): stamps timestamps and
    /// `access_count = 0`, applies the layer-default TTL, inserts into
    /// every index, then enforces capacity.
    #[instrument(skip(self, content, metadata), fields(layer = %self.kind))]
    pub async fn store(&self, content: String, mut metadata: ItemMetadata) -> Result<MemoryItem> {
        let mut diagnostics = Diagnostics::new();
        let sanitized = validate_content(&content, &mut diagnostics);
        validation::validate_metadata(&metadata, &mut diagnostics);
        if let Some(err) = diagnostics.into_error() {
            return Err(err);
        }

        let now = Utc::now();
        if metadata.expires_at.is_none() {
            if let Some(ttl_ms) = self.config.ttl_ms {
                metadata.expires_at = Some(now + chrono::Duration::milliseconds(ttl_ms));
            }
        }

        let mut item = MemoryItem::new_now(sanitized, metadata);
        item.created_at = now;
        item.updated_at = now;
        item.last_accessed_at = now;
        let id = item.id;
        let indexed_text = item.indexed_text();

        let vector = self.try_embed(&item.content).await;

        {
            let mut inner = self.inner.write().await;
            inner.store.insert(item.clone());
            inner.lexical.insert(id, &indexed_text);
            inner.temporal.insert(id, item.created_at);
        }
        if let (Some(index), Some(v)) = (&self.vector, vector) {
            let mut vi = index.write().await;
            if let Err(e) = vi.add(id, v) {
                warn!(layer = %self.kind, error = %e, "vector index add failed");
            }
        }

        self.dirty.store(true, Ordering::Relaxed);
        self.enforce_capacity().await;
        Ok(item)
    }

    async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        if !self.kind.has_vector_index() {
            return None;
        }
        match embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(layer = %self.kind, error = %e, "embedding failed, falling back to lexical only");
                None
            }
        }
    }

    /// `retrieve(id)` (spec §4.1): bumps `access_count` on hit, no side
    /// effect on miss.
    pub async fn retrieve(&self, id: Uuid) -> Option<MemoryItem> {
        let mut inner = self.inner.write().await;
        inner.store.retrieve(id, Utc::now())
    }

    /// `search(query)` (spec §4.2): within-layer hybrid fusion of lexical
    /// and (if present) vector scores.
    #[instrument(skip(self, query), fields(layer = %self.kind))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let now = Utc::now();
        let has_filters = query.has_filters();

        let lexical_hits: Vec<(Uuid, f32, String)> = {
            let inner = self.inner.read().await;
            inner
                .store
                .iter()
                .filter(|item| query.matches_filters(item))
                .filter_map(|item| {
                    let (s, reasons) = score::lexical_score(&query.text, item, now, has_filters);
                    if s > 0.0 {
                        Some((item.id, s, score::lexical_explanation(s, &reasons)))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let vector_hits: Vec<(Uuid, f32)> = match (&self.vector, &self.embedder) {
            (Some(index), Some(embedder)) => match embedder.embed(&query.text) {
                Ok(qvec) => {
                    let vi = index.read().await;
                    vi.search_with_threshold(&qvec, query.limit.max(1) * 4, 0.3)
                        .unwrap_or_default()
                }
                Err(e) => {
                    warn!(layer = %self.kind, error = %e, "query embedding unavailable, lexical-only");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let mut combined: std::collections::BTreeMap<Uuid, (f32, String)> =
            std::collections::BTreeMap::new();
        for (id, s, explanation) in lexical_hits {
            combined.insert(id, (s, explanation));
        }
        for (id, vscore) in vector_hits {
            let vexp = score::vector_explanation(vscore);
            combined
                .entry(id)
                .and_modify(|(s, e)| {
                    *s = score::combine_hybrid(*s, vscore);
                    e.push_str("; ");
                    e.push_str(&vexp);
                })
                .or_insert((vscore, vexp));
        }

        let inner = self.inner.read().await;
        let mut results: Vec<SearchResult> = combined
            .into_iter()
            .filter_map(|(id, (score, explanation))| {
                inner.store.peek(id).map(|item| SearchResult {
                    item: item.clone(),
                    score,
                    source_layer: self.kind,
                    explanation,
                })
            })
            .collect();
        drop(inner);

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(query.limit.max(1));
        Ok(results)
    }

    /// `update(id, patch)` (spec §4.1): rejects if absent; re-indexes
    /// lexically and re-embeds only if `content` changed.
    pub async fn update(&self, id: Uuid, mut patch: PartialItem) -> Result<Option<MemoryItem>> {
        let mut diagnostics = Diagnostics::new();
        if let Some(content) = &patch.content {
            patch.content = Some(validate_content(content, &mut diagnostics));
        }
        if let Some(tags) = &patch.tags {
            if tags.len() > validation::MAX_TAG_COUNT {
                diagnostics.push("tags", format!("at most {} tags allowed", validation::MAX_TAG_COUNT));
            }
        }
        if let Some(priority) = patch.priority {
            if !(1..=10).contains(&priority) {
                diagnostics.push("priority", "must be an integer in [1, 10]");
            }
        }
        if let Some(err) = diagnostics.into_error() {
            return Err(err);
        }

        let now = Utc::now();
        let content_changed;
        let updated_content;
        let result_item;
        {
            let mut inner = self.inner.write().await;
            let Some(item) = inner.store.get_mut(id) else {
                return Ok(None);
            };
            content_changed = item.apply_patch(patch, now);
            updated_content = item.content.clone();
            result_item = item.clone();
            if content_changed {
                let text = result_item.indexed_text();
                inner.lexical.reindex(id, &text);
            }
        }

        if content_changed {
            if let Some(v) = self.try_embed(&updated_content).await {
                if let Some(index) = &self.vector {
                    let mut vi = index.write().await;
                    if let Err(e) = vi.add(id, v) {
                        warn!(layer = %self.kind, error = %e, "vector re-embed add failed");
                    }
                }
            }
        }

        self.dirty.store(true, Ordering::Relaxed);
        Ok(Some(result_item))
    }

    /// `delete(id)` (spec §4.1): idempotent, removes from every index.
    pub async fn delete(&self, id: Uuid) -> bool {
        let removed = {
            let mut inner = self.inner.write().await;
            let removed = inner.store.remove(id);
            if let Some(item) = &removed {
                inner.lexical.remove(id);
                inner.temporal.remove(id, item.created_at);
            }
            removed
        };
        if let Some(index) = &self.vector {
            index.write().await.remove(id);
        }
        if removed.is_some() {
            self.dirty.store(true, Ordering::Relaxed);
        }
        removed.is_some()
    }

    pub async fn bulk_store(&self, items: Vec<(String, ItemMetadata)>) -> Result<Vec<MemoryItem>> {
        let mut out = Vec::with_capacity(items.len());
        for (content, metadata) in items {
            out.push(self.store(content, metadata).await?);
        }
        Ok(out)
    }

    pub async fn bulk_delete(&self, ids: &[Uuid]) -> usize {
        let mut count = 0;
        for id in ids {
            if self.delete(*id).await {
                count += 1;
            }
        }
        count
    }

    /// `cleanup` (spec §4.1, §4.1.5): drop expired items, compress
    /// historical low-access items on the temporal layer, enforce
    /// capacity.
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let expired_ids: Vec<Uuid> = {
            let inner = self.inner.read().await;
            inner.store.iter().filter(|i| i.is_expired(now)).map(|i| i.id).collect()
        };
        for id in &expired_ids {
            self.delete(*id).await;
        }

        if self.config.compression_on {
            self.compress_historical(now).await;
        }

        self.enforce_capacity().await;
        expired_ids.len()
    }

    async fn compress_historical(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        let candidates: Vec<Uuid> = inner
            .store
            .iter()
            .filter(|i| {
                let age_days = now.signed_duration_since(i.created_at).num_days();
                age_days >= HISTORICAL_THRESHOLD_DAYS && i.access_count < LOW_ACCESS_THRESHOLD
            })
            .map(|i| i.id)
            .collect();
        for id in candidates {
            if let Some(item) = inner.store.get_mut(id) {
                item.content = item.content.split_whitespace().collect::<Vec<_>>().join(" ");
            }
        }
    }

    async fn enforce_capacity(&self) {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.write().await;
            loop {
                if inner.store.len() <= self.config.max_items
                    && inner.store.total_bytes() as u64 <= self.config.max_bytes
                {
                    break;
                }
                let Some(id) = inner.store.ids_by_ascending_last_access().into_iter().next() else {
                    break;
                };
                if let Some(item) = inner.store.remove(id) {
                    inner.lexical.remove(id);
                    inner.temporal.remove(id, item.created_at);
                    evicted.push(id);
                } else {
                    break;
                }
            }
        }
        if !evicted.is_empty() {
            if let Some(index) = &self.vector {
                let mut vi = index.write().await;
                for id in evicted {
                    vi.remove(id);
                }
            }
        }
    }

    pub async fn stats(&self) -> LayerStats {
        let inner = self.inner.read().await;
        LayerStats {
            layer: self.kind,
            total_items: inner.store.len(),
            total_bytes: inner.store.total_bytes(),
            max_items: self.config.max_items,
            max_bytes: self.config.max_bytes,
            dirty: self.is_dirty(),
        }
    }

    pub async fn export(&self) -> Vec<MemoryItem> {
        self.inner.read().await.store.export_all()
    }

    /// `getTemporalContext(t, window_minutes, k)` (spec §4.1.5).
    pub async fn temporal_context(&self, t: DateTime<Utc>, window_minutes: i64, k: usize) -> TemporalContext {
        self.inner.read().await.temporal.context_around(t, window_minutes, k)
    }

    /// `getTemporalSimilarities(reference, k)` (spec §4.1.5).
    pub async fn temporal_similarities(&self, reference: DateTime<Utc>, k: usize) -> Vec<Uuid> {
        self.inner.read().await.temporal.similar_by_time_of_day(reference, k)
    }

    /// Pattern analysis over this layer's creation times (spec §4.1.2).
    pub async fn temporal_patterns(&self) -> Vec<TemporalPattern> {
        self.inner.read().await.temporal.analyze_patterns()
    }

    async fn clear(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.store.clear();
            inner.lexical = LexicalIndex::new();
            inner.temporal = TemporalIndex::new();
        }
        if let Some(index) = &self.vector {
            let dim = self.embedder.as_ref().map(|e| e.dimension()).unwrap_or(768);
            let settings = self.vector_settings.unwrap_or_default();
            *index.write().await = VectorIndex::new(dim, settings.n_ivf, settings.nlist, settings.nprobe);
        }
    }

    /// `export(L); L.clear(); import(L, exported)` must be the identity
    /// on observable state (spec §8 round-trip law).
    pub async fn import(&self, items: Vec<MemoryItem>) -> Result<()> {
        self.clear().await;
        {
            let mut inner = self.inner.write().await;
            for item in &items {
                inner.lexical.insert(item.id, &item.indexed_text());
                inner.temporal.insert(item.id, item.created_at);
            }
            inner.store.replace_all(items.clone());
        }
        if let (Some(index), Some(embedder)) = (&self.vector, &self.embedder) {
            let mut vi = index.write().await;
            for item in &items {
                if let Ok(v) = embedder.embed(&item.content) {
                    let _ = vi.add(item.id, v);
                }
            }
        }
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Swaps exact -> IVF (or retrains/compacts an existing IVF index)
    /// and flushes the snapshot (spec §4.1.6, §4.3).
    pub async fn optimize(&self) -> Result<()> {
        if let Some(index) = &self.vector {
            index.write().await.optimize();
        }
        self.flush().await
    }

    pub async fn backup(&self) -> Result<Uuid> {
        let items = self.export().await;
        snapshot::write_backup(&self.data_dir, &items)
            .map_err(|e| EngineError::PersistenceFailed(e.to_string()))
    }

    /// `restore(id)` atomically replaces live state with the backup's
    /// contents, rebuilding every index (spec §4.1.4).
    pub async fn restore(&self, backup_id: Uuid) -> Result<()> {
        let snap = snapshot::read_backup(&self.data_dir, backup_id)
            .map_err(|e| EngineError::PersistenceFailed(e.to_string()))?;
        self.import(snap.items).await
    }

    async fn flush(&self) -> Result<()> {
        let items = self.export().await;
        snapshot::save_items(&self.data_dir, &snapshot::LayerSnapshot::new(items))
            .map_err(|e| EngineError::PersistenceFailed(e.to_string()))?;
        if let Some(index) = &self.vector {
            let path = self.data_dir.join("vectors").join("index.json");
            index
                .read()
                .await
                .save(&path)
                .map_err(|e| EngineError::PersistenceFailed(e.to_string()))?;
        }
        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// `close()` flushes the snapshot and vector index (spec §4.1.3, §5).
    pub async fn close(&self) -> Result<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicHashEmbedder;

    fn meta(category: &str, priority: u8) -> ItemMetadata {
        ItemMetadata::new(category, priority, "test")
    }

    fn session_layer() -> (Layer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let layer = Layer::new(
            MemoryLayer::Session,
            LayerConfig {
                max_items: 3,
                max_bytes: 10 * 1024 * 1024,
                ttl_ms: None,
                compression_on: false,
                indexing_on: true,
                flush_interval_minutes: None,
            },
            dir.path().to_path_buf(),
            None,
            None,
        );
        (layer, dir)
    }

    fn global_layer() -> (Layer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let layer = Layer::new(
            MemoryLayer::Global,
            LayerConfig {
                max_items: 1000,
                max_bytes: 10 * 1024 * 1024,
                ttl_ms: None,
                compression_on: false,
                indexing_on: true,
                flush_interval_minutes: None,
            },
            dir.path().to_path_buf(),
            Some(VectorIndexSettings::default()),
            Some(Arc::new(DeterministicHashEmbedder::new(32))),
        );
        (layer, dir)
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips_content() {
        let (layer, _dir) = session_layer();
        let item = layer.store("hello world".into(), meta("general", 5)).await.unwrap();
        let retrieved = layer.retrieve(item.id).await.unwrap();
        assert_eq!(retrieved.content, "hello world");
        assert_eq!(retrieved.access_count, 1);
    }

    #[tokio::test]
    async fn retrieve_on_miss_returns_none() {
        let (layer, _dir) = session_layer();
        assert!(layer.retrieve(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn store_rejects_empty_content() {
        let (layer, _dir) = session_layer();
        let result = layer.store("   ".into(), meta("general", 5)).await;
        assert!(matches!(result, Err(EngineError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_accessed() {
        let (layer, _dir) = session_layer();
        let a = layer.store("A".into(), meta("general", 5)).await.unwrap();
        let b = layer.store("B".into(), meta("general", 5)).await.unwrap();
        let c = layer.store("C".into(), meta("general", 5)).await.unwrap();
        layer.retrieve(a.id).await;
        let d = layer.store("D".into(), meta("general", 5)).await.unwrap();

        let stats = layer.stats().await;
        assert_eq!(stats.total_items, 3);
        assert!(layer.retrieve(b.id).await.is_none());
        assert!(layer.retrieve(c.id).await.is_some());
        assert!(layer.retrieve(d.id).await.is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (layer, _dir) = session_layer();
        let item = layer.store("hello".into(), meta("general", 5)).await.unwrap();
        assert!(layer.delete(item.id).await);
        assert!(!layer.delete(item.id).await);
    }

    #[tokio::test]
    async fn update_reindexes_only_on_content_change() {
        let (layer, _dir) = session_layer();
        let item = layer.store("original content".into(), meta("general", 5)).await.unwrap();
        let updated = layer
            .update(
                item.id,
                PartialItem {
                    priority: Some(9),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.metadata.priority, 9);
        assert_eq!(updated.content, "original content");
    }

    #[tokio::test]
    async fn search_finds_stored_item_by_keyword() {
        let (layer, _dir) = session_layer();
        layer
            .store("Currently debugging React login form".into(), meta("session", 6))
            .await
            .unwrap();
        let results = layer
            .search(&SearchQuery {
                text: "react login".into(),
                limit: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results[0].explanation.contains("content match"));
    }

    #[tokio::test]
    async fn global_layer_hybrid_search_mentions_both_streams() {
        let (layer, _dir) = global_layer();
        layer
            .store(
                "Critical security vulnerability in auth flow".into(),
                meta("security", 10),
            )
            .await
            .unwrap();
        let results = layer
            .search(&SearchQuery {
                text: "auth vulnerability".into(),
                limit: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results[0].explanation.contains("content match"));
        assert!(results[0].explanation.contains("semantic similarity"));
    }

    #[tokio::test]
    async fn export_clear_import_is_identity_on_stats() {
        let (layer, _dir) = session_layer();
        layer.store("one".into(), meta("general", 5)).await.unwrap();
        layer.store("two".into(), meta("general", 5)).await.unwrap();
        let before = layer.stats().await;
        let exported = layer.export().await;

        layer.clear().await;
        assert_eq!(layer.stats().await.total_items, 0);

        layer.import(exported).await.unwrap();
        let after = layer.stats().await;
        assert_eq!(before.total_items, after.total_items);
    }

    #[tokio::test]
    async fn backup_then_restore_returns_to_prior_stats() {
        let (layer, _dir) = session_layer();
        layer.store("one".into(), meta("general", 5)).await.unwrap();
        let backup_id = layer.backup().await.unwrap();
        let before = layer.stats().await;

        layer.store("two".into(), meta("general", 5)).await.unwrap();
        assert_ne!(layer.stats().await.total_items, before.total_items);

        layer.restore(backup_id).await.unwrap();
        let after = layer.stats().await;
        assert_eq!(before.total_items, after.total_items);
    }

    #[tokio::test]
    async fn cleanup_removes_expired_items() {
        let (layer, _dir) = session_layer();
        let item = layer.store("expiring".into(), meta("general", 5)).await.unwrap();
        layer
            .update(
                item.id,
                PartialItem {
                    expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let removed = layer.cleanup().await;
        assert_eq!(removed, 1);
        assert!(layer.retrieve(item.id).await.is_none());
    }
}
