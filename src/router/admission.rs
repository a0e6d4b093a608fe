//! Storage admission: `determine_storage_layer(content, metadata)`.
//!
//! A deterministic, pure function, first-match-wins over five rules.
//! Grounded on the teacher's preference for small free functions over a
//! `Rule` trait object graph when the rule set is fixed and auditable —
//! see `advanced/intent.rs`'s ordered-match classification.

use crate::item::{ItemMetadata, MemoryLayer};

const SESSION_CATEGORIES: &[&str] = &["session", "current-work"];
const GLOBAL_CATEGORIES: &[&str] = &["security", "knowledge", "design"];
const GLOBAL_TAGS: &[&str] = &["reference", "important"];
const TEMPORAL_CATEGORIES: &[&str] = &["historical", "pattern"];

/// Pick the layer a new item is admitted into. Content is accepted but
/// unused today; the signature keeps it so future rules (e.g. a content
/// length cutoff) don't need to change the call site.
pub fn determine_storage_layer(_content: &str, metadata: &ItemMetadata) -> MemoryLayer {
    let category = metadata.category.as_str();

    if SESSION_CATEGORIES.contains(&category) || metadata.tags.contains("temporary") {
        return MemoryLayer::Session;
    }

    if metadata.priority >= 9
        || GLOBAL_CATEGORIES.contains(&category)
        || GLOBAL_TAGS.iter().any(|t| metadata.tags.contains(*t))
    {
        return MemoryLayer::Global;
    }

    if metadata.project_id.is_some() || category == "project-specific" {
        return MemoryLayer::Project;
    }

    if TEMPORAL_CATEGORIES.contains(&category) || metadata.tags.contains("historical") {
        return MemoryLayer::Temporal;
    }

    MemoryLayer::Project
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(category: &str, priority: u8) -> ItemMetadata {
        ItemMetadata::new(category, priority, "test")
    }

    #[test]
    fn session_category_wins_first() {
        let m = meta("current-work", 10);
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Session);
    }

    #[test]
    fn temporary_tag_routes_to_session_even_with_high_priority() {
        let mut m = meta("security", 10);
        m.tags.insert("temporary".into());
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Session);
    }

    #[test]
    fn high_priority_routes_to_global() {
        let m = meta("general", 9);
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Global);
    }

    #[test]
    fn reference_tag_routes_to_global() {
        let mut m = meta("general", 3);
        m.tags.insert("reference".into());
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Global);
    }

    #[test]
    fn project_id_routes_to_project() {
        let mut m = meta("general", 3);
        m.project_id = Some("proj-1".into());
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Project);
    }

    #[test]
    fn historical_category_routes_to_temporal() {
        let m = meta("historical", 3);
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Temporal);
    }

    #[test]
    fn unmatched_defaults_to_project() {
        let m = meta("general", 3);
        assert_eq!(determine_storage_layer("x", &m), MemoryLayer::Project);
    }
}
