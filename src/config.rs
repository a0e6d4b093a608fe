//! Engine configuration
//!
//! A single typed record, loadable from JSON or TOML by the embedding
//! application, that drives every tunable named in the specification.
//! Every layer/router/relationship default lives here with the numeric
//! default the spec gives it, the way the teacher scatters `*Config`
//! structs with `Default` impls throughout `storage`, `search` and
//! `consolidation` — generalized here into one top-level record per the
//! "Environment / config" section of the interface spec.

use serde::{Deserialize, Serialize};

/// Per-layer capacity, TTL and feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    /// Maximum number of items the layer will hold.
    pub max_items: usize,
    /// Maximum total byte size of the layer's content.
    pub max_bytes: u64,
    /// Default time-to-live applied to new items, in milliseconds.
    /// `None` means items never expire by default.
    pub ttl_ms: Option<i64>,
    /// Whether the temporal-layer compression pass runs during cleanup.
    pub compression_on: bool,
    /// Whether lexical/vector indexing is enabled for this layer.
    pub indexing_on: bool,
    /// Background snapshot-flush interval, in minutes. `None` disables
    /// periodic flushing (the session layer never flushes).
    pub flush_interval_minutes: Option<u64>,
}

impl LayerConfig {
    fn session() -> Self {
        Self {
            max_items: 50,
            max_bytes: 1 * 1024 * 1024,
            ttl_ms: None,
            compression_on: false,
            indexing_on: true,
            flush_interval_minutes: None,
        }
    }

    fn project() -> Self {
        Self {
            max_items: 1_000,
            max_bytes: 10 * 1024 * 1024,
            ttl_ms: Some(30 * 24 * 60 * 60 * 1000),
            compression_on: false,
            indexing_on: true,
            flush_interval_minutes: Some(5),
        }
    }

    fn global() -> Self {
        Self {
            max_items: 50_000,
            max_bytes: 500 * 1024 * 1024,
            ttl_ms: Some(365 * 24 * 60 * 60 * 1000),
            compression_on: false,
            indexing_on: true,
            flush_interval_minutes: Some(10),
        }
    }

    fn temporal() -> Self {
        Self {
            max_items: 50_000,
            max_bytes: 500 * 1024 * 1024,
            ttl_ms: None,
            compression_on: true,
            indexing_on: true,
            flush_interval_minutes: Some(10),
        }
    }
}

/// Ranking weights for the router's composite score (spec §4.2.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankingWeights {
    pub recency: f32,
    pub frequency: f32,
    pub relevance: f32,
    pub priority: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            recency: 0.3,
            frequency: 0.2,
            priority: 0.1,
        }
    }
}

/// Router-level tuning: fallback behavior and result limits (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    pub session_threshold: f32,
    pub project_threshold: f32,
    pub global_threshold: f32,
    /// Whether the temporal layer is added to a query's candidate set when
    /// the other three layers return fewer than `min_results`.
    pub temporal_fallback: bool,
    pub min_results: usize,
    pub max_results: usize,
    pub weights: RankingWeights,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            session_threshold: 0.5,
            project_threshold: 0.5,
            global_threshold: 0.5,
            temporal_fallback: true,
            min_results: 3,
            max_results: 20,
            weights: RankingWeights::default(),
        }
    }
}

/// Relationship engine tuning (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipConfig {
    pub enabled: bool,
    pub min_confidence: f32,
    pub batch_size: usize,
    pub max_per_memory: usize,
    /// Maximum candidate items considered per detection pass (spec's `N_cand`).
    pub max_candidates: usize,
    /// Maximum concurrent in-flight detector batches.
    pub max_in_flight_batches: usize,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: 0.6,
            batch_size: 50,
            max_per_memory: 10,
            max_candidates: 100,
            max_in_flight_batches: 4,
        }
    }
}

/// Multi-tenant access control and audit tuning (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    pub tenant_isolation: bool,
    pub access_control: bool,
    pub audit_logging: bool,
    /// When true, any operation called without a `TenantContext` returns
    /// an empty/null result rather than raising (spec §4.7).
    pub require_auth: bool,
    pub default_tenant: String,
    /// Capacity of the bounded audit-event ring buffer.
    pub audit_ring_capacity: usize,
    /// Token-bucket capacity per `(operation, tenant_id, user_id)`.
    pub rate_limit_capacity: u32,
    /// Token-bucket refill rate, tokens per second.
    pub rate_limit_refill_per_sec: f64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            tenant_isolation: true,
            access_control: true,
            audit_logging: true,
            require_auth: false,
            default_tenant: "default".to_string(),
            audit_ring_capacity: 1000,
            rate_limit_capacity: 60,
            rate_limit_refill_per_sec: 1.0,
        }
    }
}

/// Embedding backend tuning; the backend itself is injected separately
/// (see [`crate::embeddings::EmbeddingProvider`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dimension: usize,
    pub max_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "external".to_string(),
            dimension: 768,
            max_tokens: 8192,
        }
    }
}

/// Vector index tuning for the exact→IVF transition (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexSettings {
    /// Vector count at which the index trains an IVF quantizer.
    pub n_ivf: usize,
    /// Number of coarse-quantizer centroids.
    pub nlist: usize,
    /// Number of centroids probed per search once approximate.
    pub nprobe: usize,
}

impl Default for VectorIndexSettings {
    fn default() -> Self {
        Self {
            n_ivf: 5000,
            nlist: 200,
            nprobe: 20,
        }
    }
}

/// Top-level configuration for the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub session: LayerConfig,
    pub project: LayerConfig,
    pub global: LayerConfig,
    pub temporal: LayerConfig,
    pub routing: RoutingConfig,
    pub relationships: RelationshipConfig,
    pub security: SecurityConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexSettings,
    /// Directory snapshots and backups are written under.
    pub data_dir: std::path::PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: LayerConfig::session(),
            project: LayerConfig::project(),
            global: LayerConfig::global(),
            temporal: LayerConfig::temporal(),
            routing: RoutingConfig::default(),
            relationships: RelationshipConfig::default(),
            security: SecurityConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_index: VectorIndexSettings::default(),
            data_dir: std::path::PathBuf::from("./tiered-memory-data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layer_capacities_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.session.max_items, 50);
        assert_eq!(cfg.project.max_items, 1_000);
        assert_eq!(cfg.global.max_items, 50_000);
        assert_eq!(cfg.temporal.max_items, 50_000);
        assert!(cfg.session.flush_interval_minutes.is_none());
        assert_eq!(cfg.project.flush_interval_minutes, Some(5));
    }

    #[test]
    fn default_ranking_weights_sum_to_one() {
        let w = RankingWeights::default();
        let sum = w.recency + w.frequency + w.relevance + w.priority;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
