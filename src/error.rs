//! Engine-wide error type
//!
//! Every module defines a narrower `thiserror` error where it has its own
//! failure modes (the lexical index, the vector index, the snapshot
//! loader); those widen into [`EngineError`] at the point where a result
//! crosses into the router or tenant overlay, the way the teacher's
//! `StorageError` widens from `rusqlite::Error`.

use std::collections::BTreeMap;

/// Top-level error surfaced to callers of the engine's public API.
///
/// Variants map one-to-one onto the error kinds in the specification's
/// error handling design: callers are expected to match on these, not on
/// message text.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Operation needs a tenant context and none was given under tenant
    /// isolation.
    #[error("authentication required")]
    AuthRequired,

    /// The id does not exist in any layer visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input violated a validation rule; `diagnostics` is `(field, reason)`.
    #[error("validation failed ({count} field(s))", count = diagnostics.len())]
    ValidationFailed {
        /// Per-field diagnostics, e.g. `("tags[3]", "must match [A-Za-z0-9_-]+")`.
        diagnostics: Vec<(String, String)>,
    },

    /// The caller's per-(operation, tenant, user) token bucket is empty.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested backoff in milliseconds.
        retry_after_ms: u64,
    },

    /// Store failed even after eviction; a single item exceeds the layer's
    /// byte cap.
    #[error("capacity exhausted in layer {layer}")]
    CapacityExhausted {
        /// The layer that could not admit the item.
        layer: String,
    },

    /// The vector path failed; callers receive lexical-only results.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Snapshot read/write failed. The in-memory operation still
    /// succeeded; the layer's dirty flag remains set.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Unexpected internal failure. Detail is logged, not returned.
    #[error("an error occurred")]
    Internal,
}

impl EngineError {
    /// Build a [`EngineError::ValidationFailed`] from a single field/reason pair.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::ValidationFailed {
            diagnostics: vec![(field.into(), reason.into())],
        }
    }

    /// Merge several field-level validation failures into one error.
    pub fn validation_many(diagnostics: Vec<(String, String)>) -> Self {
        EngineError::ValidationFailed { diagnostics }
    }

    /// A safe, user-facing message. `Internal` never leaks detail here;
    /// full context goes to `tracing` at the call site instead.
    pub fn safe_message(&self) -> String {
        match self {
            EngineError::Internal => "an error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Per-field diagnostics keyed by field name, used when building a
/// [`EngineError::ValidationFailed`] incrementally.
#[derive(Debug, Default)]
pub struct Diagnostics(BTreeMap<String, String>);

impl Diagnostics {
    /// A fresh, empty diagnostics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.insert(field.into(), reason.into());
    }

    /// True if no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turn the collected diagnostics into an [`EngineError`], if any exist.
    pub fn into_error(self) -> Option<EngineError> {
        if self.0.is_empty() {
            None
        } else {
            Some(EngineError::validation_many(self.0.into_iter().collect()))
        }
    }
}

/// Convenience alias for engine-level results.
pub type Result<T> = std::result::Result<T, EngineError>;
