//! The unit of storage: `MemoryItem` and its metadata.
//!
//! Mirrors the teacher's `KnowledgeNode` shape (camelCase serde, a
//! `Default` for the metadata block, plain getters rather than
//! validation-on-construction) but with the fields this system's data
//! model actually names, and a `Layer` enum in place of `NodeType`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four tiers an item can live in.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryLayer {
    Session,
    Project,
    Global,
    Temporal,
}

impl MemoryLayer {
    pub const ALL: [MemoryLayer; 4] = [
        MemoryLayer::Session,
        MemoryLayer::Project,
        MemoryLayer::Global,
        MemoryLayer::Temporal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::Session => "session",
            MemoryLayer::Project => "project",
            MemoryLayer::Global => "global",
            MemoryLayer::Temporal => "temporal",
        }
    }

    /// Tie-break priority used when the router merges duplicate ids
    /// across layers: lower number wins.
    pub fn merge_priority(&self) -> u8 {
        match self {
            MemoryLayer::Session => 0,
            MemoryLayer::Project => 1,
            MemoryLayer::Global => 2,
            MemoryLayer::Temporal => 3,
        }
    }

    /// Only the global layer carries a dense-vector index.
    pub fn has_vector_index(&self) -> bool {
        matches!(self, MemoryLayer::Global)
    }
}

impl std::fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "session" => Ok(MemoryLayer::Session),
            "project" => Ok(MemoryLayer::Project),
            "global" => Ok(MemoryLayer::Global),
            "temporal" => Ok(MemoryLayer::Temporal),
            other => Err(format!("unknown layer: {other}")),
        }
    }
}

/// Visibility of an item within its tenant.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
    Public,
}

/// Everything about an item beyond its raw content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub tags: BTreeSet<String>,
    pub category: String,
    /// 1 (lowest) .. 10 (highest).
    pub priority: u8,
    pub source: String,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Stamped by the tenant overlay on write; immutable afterward.
    pub tenant_id: String,
    /// Stamped by the tenant overlay on write.
    pub created_by: String,
    pub visibility: Visibility,
    /// Open-ended caller data beyond the typed fields above. Round-trips
    /// through snapshots as opaque JSON; the engine never interprets it.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl ItemMetadata {
    /// A bare-minimum metadata record for tests and simple callers:
    /// default category/priority, no tenant stamp yet.
    pub fn new(category: impl Into<String>, priority: u8, source: impl Into<String>) -> Self {
        Self {
            tags: BTreeSet::new(),
            category: category.into(),
            priority,
            source: source.into(),
            project_id: None,
            session_id: None,
            user_id: None,
            expires_at: None,
            tenant_id: String::new(),
            created_by: String::new(),
            visibility: Visibility::Private,
            extensions: BTreeMap::new(),
        }
    }
}

/// A partial record supplied to `store`/`update`; only `content` plus
/// whatever metadata fields the caller wants to set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialItem {
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    pub category: Option<String>,
    pub priority: Option<u8>,
    pub source: Option<String>,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

/// The unit of storage.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    pub id: Uuid,
    pub content: String,
    pub metadata: ItemMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl MemoryItem {
    /// Assemble a freshly admitted item. `id`/timestamps/`access_count`
    /// are stamped here; callers never supply them directly (spec §4.1
    /// `store`).
    pub fn new_now(content: String, metadata: ItemMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content,
            metadata,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.expires_at.is_some_and(|exp| exp < now)
    }

    /// Approximate on-wire byte size, used for layer byte-capacity
    /// enforcement. Content plus a fixed overhead for metadata/ids.
    pub fn approx_size_bytes(&self) -> usize {
        self.content.len()
            + self.metadata.category.len()
            + self.metadata.source.len()
            + self.metadata.tags.iter().map(|t| t.len()).sum::<usize>()
            + 256
    }

    /// Record a successful read: bump `access_count`, touch
    /// `last_accessed_at`. Never called on a miss (spec §4.1 `retrieve`).
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// Apply a patch produced by `update`. Returns whether `content`
    /// changed, since callers must re-index lexically/re-embed only then.
    pub fn apply_patch(&mut self, patch: PartialItem, now: DateTime<Utc>) -> bool {
        let mut content_changed = false;
        if let Some(content) = patch.content {
            self.content = content;
            content_changed = true;
        }
        if let Some(tags) = patch.tags {
            self.metadata.tags = tags;
        }
        if let Some(category) = patch.category {
            self.metadata.category = category;
        }
        if let Some(priority) = patch.priority {
            self.metadata.priority = priority;
        }
        if let Some(source) = patch.source {
            self.metadata.source = source;
        }
        if patch.project_id.is_some() {
            self.metadata.project_id = patch.project_id;
        }
        if patch.session_id.is_some() {
            self.metadata.session_id = patch.session_id;
        }
        if patch.user_id.is_some() {
            self.metadata.user_id = patch.user_id;
        }
        if patch.expires_at.is_some() {
            self.metadata.expires_at = patch.expires_at;
        }
        if let Some(visibility) = patch.visibility {
            self.metadata.visibility = visibility;
        }
        if let Some(extensions) = patch.extensions {
            self.metadata.extensions = extensions;
        }
        self.updated_at = now;
        content_changed
    }

    /// Text the lexical index tokenizes: content, tags, category (spec
    /// §4.1.1).
    pub fn indexed_text(&self) -> String {
        let mut text = self.content.clone();
        for tag in &self.metadata.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text.push(' ');
        text.push_str(&self.metadata.category);
        text
    }
}
