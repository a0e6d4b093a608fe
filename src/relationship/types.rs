//! Relationship, version and suggestion records (spec §3).
//!
//! `MemoryRelationship` mirrors the teacher's `KnowledgeEdge` shape
//! (`id`/`source_id`/`target_id`/edge kind/`confidence`/`created_at`) with
//! the spec's own field set layered on (`weight`, `algorithm`, `source`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Reference,
    Contextual,
    Causal,
    Temporal,
    Hierarchical,
    Contradiction,
    Confirmation,
    Evolution,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 8] = [
        RelationshipType::Reference,
        RelationshipType::Contextual,
        RelationshipType::Causal,
        RelationshipType::Temporal,
        RelationshipType::Hierarchical,
        RelationshipType::Contradiction,
        RelationshipType::Confirmation,
        RelationshipType::Evolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Reference => "reference",
            RelationshipType::Contextual => "contextual",
            RelationshipType::Causal => "causal",
            RelationshipType::Temporal => "temporal",
            RelationshipType::Hierarchical => "hierarchical",
            RelationshipType::Contradiction => "contradiction",
            RelationshipType::Confirmation => "confirmation",
            RelationshipType::Evolution => "evolution",
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSource {
    AutoDetected,
    UserConfirmed,
    UserModified,
}

/// A directed, typed edge between two memory ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRelationship {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    pub confidence: f32,
    pub weight: f32,
    pub algorithm: String,
    pub source: RelationshipSource,
    pub created_at: DateTime<Utc>,
}

impl MemoryRelationship {
    /// Deterministic edge id from `(source, target, type)`, so re-detection
    /// of the same pair and type always yields the same relationship id
    /// (spec §4.5.1 step 4).
    pub fn deterministic_id(source_id: Uuid, target_id: Uuid, kind: RelationshipType) -> Uuid {
        let name = format!("{source_id}:{target_id}:{}", kind.as_str());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    pub fn new(
        source_id: Uuid,
        target_id: Uuid,
        kind: RelationshipType,
        confidence: f32,
        weight: f32,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            id: Self::deterministic_id(source_id, target_id, kind),
            source_id,
            target_id,
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            weight: weight.clamp(0.0, 1.0),
            algorithm: algorithm.into(),
            source: RelationshipSource::AutoDetected,
            created_at: Utc::now(),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Merge,
    Split,
}

/// One entry in a memory's append-only version chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryVersion {
    pub version_id: Uuid,
    pub memory_id: Uuid,
    pub change_type: ChangeType,
    pub changes: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub parent_version_id: Option<Uuid>,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Confirmed,
    Rejected,
    Modified,
}

/// Queued validation unit surfaced to a human reviewer (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSuggestion {
    pub id: Uuid,
    pub relationship: MemoryRelationship,
    pub source_content: String,
    pub target_content: String,
    pub status: SuggestionStatus,
    pub suggested_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub user_feedback: Option<String>,
    pub modified_type: Option<RelationshipType>,
    pub modified_confidence: Option<f32>,
    pub algorithm: String,
    pub confidence: f32,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayRecommendation {
    Promote,
    Maintain,
    Archive,
    Delete,
}

/// Derived, never stored: a memory's current decay posture (spec §4.5.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayPrediction {
    pub memory_id: Uuid,
    pub importance: f32,
    pub predicted_importance: f32,
    pub decay_rate: f32,
    pub time_to_obsolescence_days: f32,
    pub access_freq: f32,
    pub recency: f32,
    pub rel_strength: f32,
    pub recommendation: DecayRecommendation,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Duplication,
    Contradiction,
    Inconsistency,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Merge,
    Prioritize,
    Contextualize,
    Coexist,
}

/// A detected pairwise conflict between two memories (spec §4.5.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConflict {
    pub memory_a: Uuid,
    pub memory_b: Uuid,
    pub severity: ConflictSeverity,
    pub confidence: f32,
    pub suggested_resolutions: Vec<ConflictResolution>,
}

/// One node in the on-demand knowledge graph view (spec §4.5.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub memory_id: Uuid,
    pub degree: usize,
    pub clustering_coefficient: f32,
    pub centrality: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<MemoryRelationship>,
    pub central_nodes: Vec<Uuid>,
}
