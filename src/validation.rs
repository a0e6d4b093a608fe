//! Boundary validation (spec §6 "Validation rules at the boundary").
//!
//! Pure functions; callers assemble a [`Diagnostics`] and turn it into an
//! [`EngineError::ValidationFailed`] at the call site, mirroring the
//! field-at-a-time style the teacher uses for `IngestInput` checks.

use uuid::Uuid;

use crate::error::Diagnostics;
use crate::item::ItemMetadata;

/// Content is bounded at 100 KiB after sanitization (spec §3).
pub const MAX_CONTENT_BYTES: usize = 100 * 1024;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_TAG_COUNT: usize = 20;

/// Strip control characters other than `\n`/`\t`, per SPEC_FULL.md §3's
/// content-sanitization supplement.
pub fn sanitize_content(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn contains_unsafe_uri(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<script")
        || lower.contains("javascript:")
        || lower.contains("data:text/html")
}

fn valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validate sanitized content. Returns the sanitized string on success.
pub fn validate_content(raw: &str, diagnostics: &mut Diagnostics) -> String {
    let sanitized = sanitize_content(raw);
    if sanitized.trim().is_empty() {
        diagnostics.push("content", "must be non-empty after trimming");
    }
    if sanitized.len() > MAX_CONTENT_BYTES {
        diagnostics.push(
            "content",
            format!("exceeds {MAX_CONTENT_BYTES} bytes after sanitization"),
        );
    }
    if contains_unsafe_uri(&sanitized) {
        diagnostics.push("content", "contains a disallowed script or URI pattern");
    }
    sanitized
}

/// Validate metadata fields that have boundary rules: tags, priority.
/// `category`/`source` have no format constraint beyond being present.
pub fn validate_metadata(metadata: &ItemMetadata, diagnostics: &mut Diagnostics) {
    if metadata.tags.len() > MAX_TAG_COUNT {
        diagnostics.push(
            "tags",
            format!("at most {MAX_TAG_COUNT} tags allowed, got {}", metadata.tags.len()),
        );
    }
    for tag in &metadata.tags {
        if !valid_tag(tag) {
            diagnostics.push(format!("tags[{tag}]"), "must match [A-Za-z0-9_-]+, length 1..50");
        }
    }
    if !(1..=10).contains(&metadata.priority) {
        diagnostics.push("priority", "must be an integer in [1, 10]");
    }
}

/// A client-supplied id must parse as a UUID (spec §6).
pub fn validate_client_id(raw: &str, diagnostics: &mut Diagnostics) -> Option<Uuid> {
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            diagnostics.push("id", "must be a valid UUID");
            None
        }
    }
}
