//! The eight pairwise relationship detectors (spec §4.5.2).
//!
//! A closed sum type plus a dispatcher rather than trait objects, per the
//! redesign note favoring an auditable, boundable detector set over
//! dynamic dispatch/mixins.

use std::collections::BTreeSet;

use chrono::Duration;

use super::types::{MemoryRelationship, RelationshipType};
use crate::item::MemoryItem;
use crate::layer::lexical::tokenize;

const CAUSAL_MARKERS: &[&str] = &[
    "because",
    "due to",
    "caused by",
    "results in",
    "leads to",
    "therefore",
    "consequently",
];

const HIERARCHICAL_MARKERS: &[&str] = &[
    "parent",
    "child",
    "contains",
    "part of",
    "belongs to",
    "section",
    "chapter",
    "subsection",
];

const CONTRADICTION_MARKERS: &[&str] = &[
    "however",
    "but",
    "although",
    "despite",
    "contrary",
    "opposite",
    "not",
    "never",
    "disagree",
];

const CONFIRMATION_MARKERS: &[&str] = &[
    "confirms",
    "supports",
    "validates",
    "proves",
    "shows",
    "demonstrates",
    "agrees",
    "consistent",
];

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count().max(1);
    intersection as f32 / union as f32
}

fn shares_url(a: &str, b: &str) -> bool {
    fn urls(text: &str) -> BTreeSet<&str> {
        text.split_whitespace()
            .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
            .collect()
    }
    urls(a).intersection(&urls(b)).next().is_some()
}

fn contains_any(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| haystack.contains(m))
}

/// Run all eight detectors for one ordered pair `(new, candidate)` and
/// return every edge that fired, regardless of confidence — callers filter
/// by `min_confidence` themselves.
pub fn detect_all(new: &MemoryItem, candidate: &MemoryItem) -> Vec<MemoryRelationship> {
    let mut edges = Vec::new();
    if let Some(edge) = reference(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = contextual(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = causal(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = temporal(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = hierarchical(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = contradiction(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = confirmation(new, candidate) {
        edges.push(edge);
    }
    if let Some(edge) = evolution(new, candidate) {
        edges.push(edge);
    }
    edges
}

fn reference(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a = new.content.as_str();
    let b = candidate.content.as_str();
    let hits_id = a.contains(&candidate.id.to_string()) || b.contains(&new.id.to_string());
    if hits_id || shares_url(a, b) {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Reference,
            0.9,
            0.8,
            "reference_detector",
        ))
    } else {
        None
    }
}

fn contextual(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let shared_tags = new.metadata.tags.intersection(&candidate.metadata.tags).count();
    let same_cat = new.metadata.category == candidate.metadata.category
        && new.metadata.category != "knowledge";
    let same_project = new.metadata.project_id.is_some()
        && new.metadata.project_id == candidate.metadata.project_id;

    let triggers = shared_tags >= 2
        || (shared_tags >= 1 && same_cat)
        || (same_cat && same_project);
    if !triggers {
        return None;
    }

    let confidence = (0.25 * shared_tags as f32 + 0.3 * same_cat as u8 as f32 + 0.2 * same_project as u8 as f32)
        .min(1.0);
    Some(MemoryRelationship::new(
        new.id,
        candidate.id,
        RelationshipType::Contextual,
        confidence,
        0.6,
        "contextual_detector",
    ))
}

fn causal(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a = new.content.to_lowercase();
    let b = candidate.content.to_lowercase();
    if contains_any(&a, CAUSAL_MARKERS) || contains_any(&b, CAUSAL_MARKERS) {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Causal,
            0.7,
            0.7,
            "causal_detector",
        ))
    } else {
        None
    }
}

fn temporal(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let delta = (new.created_at - candidate.created_at).num_minutes().abs() as f32 / 60.0;
    if delta >= 4.0 {
        return None;
    }
    let shared_tag = new.metadata.tags.intersection(&candidate.metadata.tags).next().is_some();
    let same_cat = new.metadata.category == candidate.metadata.category;
    if !(shared_tag || same_cat) {
        return None;
    }
    let confidence = (1.0 - delta / 4.0).max(0.5);
    Some(MemoryRelationship::new(
        new.id,
        candidate.id,
        RelationshipType::Temporal,
        confidence,
        0.4,
        "temporal_detector",
    ))
}

fn hierarchical(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a = new.content.to_lowercase();
    let b = candidate.content.to_lowercase();
    if contains_any(&a, HIERARCHICAL_MARKERS) || contains_any(&b, HIERARCHICAL_MARKERS) {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Hierarchical,
            0.8,
            0.7,
            "hierarchical_detector",
        ))
    } else {
        None
    }
}

fn contradiction(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a_tokens: BTreeSet<String> = tokenize(&new.content).into_iter().collect();
    let b_tokens: BTreeSet<String> = tokenize(&candidate.content).into_iter().collect();
    if jaccard(&a_tokens, &b_tokens) < 0.3 {
        return None;
    }
    let a = new.content.to_lowercase();
    let b = candidate.content.to_lowercase();
    if contains_any(&a, CONTRADICTION_MARKERS) || contains_any(&b, CONTRADICTION_MARKERS) {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Contradiction,
            0.8,
            0.9,
            "contradiction_detector",
        ))
    } else {
        None
    }
}

fn confirmation(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a = new.content.to_lowercase();
    let b = candidate.content.to_lowercase();
    if contains_any(&a, CONFIRMATION_MARKERS) || contains_any(&b, CONFIRMATION_MARKERS) {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Confirmation,
            0.7,
            0.8,
            "confirmation_detector",
        ))
    } else {
        None
    }
}

fn evolution(new: &MemoryItem, candidate: &MemoryItem) -> Option<MemoryRelationship> {
    let a_tokens: BTreeSet<String> = tokenize(&new.content).into_iter().collect();
    let b_tokens: BTreeSet<String> = tokenize(&candidate.content).into_iter().collect();
    let union = a_tokens.union(&b_tokens).count().max(1);
    let intersection = a_tokens.intersection(&b_tokens).count();
    let cosine_proxy = intersection as f32 / union as f32;
    if cosine_proxy > 0.7 && new.updated_at != candidate.updated_at {
        Some(MemoryRelationship::new(
            new.id,
            candidate.id,
            RelationshipType::Evolution,
            0.9,
            0.8,
            "evolution_detector",
        ))
    } else {
        None
    }
}

/// Minimum gap enforced by the `temporal` detector's trigger window.
pub const TEMPORAL_WINDOW: Duration = Duration::hours(4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;

    fn item(content: &str, category: &str) -> MemoryItem {
        MemoryItem::new_now(content.to_string(), ItemMetadata::new(category, 5, "test"))
    }

    #[test]
    fn reference_detects_shared_url() {
        let a = item("see https://example.com/doc for context", "general");
        let b = item("https://example.com/doc has the full spec", "general");
        let edges = detect_all(&a, &b);
        assert!(edges.iter().any(|e| e.kind == RelationshipType::Reference));
    }

    #[test]
    fn contextual_needs_two_shared_tags_or_category_plus_one() {
        let mut a = item("alpha content", "security");
        let mut b = item("beta content", "security");
        a.metadata.tags.insert("auth".into());
        b.metadata.tags.insert("auth".into());
        let edges = detect_all(&a, &b);
        assert!(edges.iter().any(|e| e.kind == RelationshipType::Contextual));
    }

    #[test]
    fn causal_marker_triggers() {
        let a = item("the outage happened because the cache expired", "general");
        let b = item("unrelated note", "general");
        let edges = detect_all(&a, &b);
        assert!(edges.iter().any(|e| e.kind == RelationshipType::Causal));
    }

    #[test]
    fn contradiction_needs_overlap_and_marker() {
        let a = item("the deploy pipeline uses blue green releases", "general");
        let b = item("however the deploy pipeline never uses blue green releases", "general");
        let edges = detect_all(&a, &b);
        assert!(edges.iter().any(|e| e.kind == RelationshipType::Contradiction));
    }

    #[test]
    fn no_markers_produces_no_edges_for_text_detectors() {
        let a = item("quiet unrelated sentence one", "general");
        let b = item("another quiet sentence two", "other");
        let edges = detect_all(&a, &b);
        assert!(!edges.iter().any(|e| e.kind == RelationshipType::Causal));
        assert!(!edges.iter().any(|e| e.kind == RelationshipType::Hierarchical));
        assert!(!edges.iter().any(|e| e.kind == RelationshipType::Confirmation));
    }
}
