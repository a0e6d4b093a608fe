//! Per-layer relevance scoring (spec §4.2.1, §4.2.2).
//!
//! Pure functions operating on already-tokenized text, grounded on the
//! teacher's `search/hybrid.rs` style of "free function plus a `*Config`
//! wrapping its constants" — here the constants are the spec's own
//! boost/weight literals, not configurable, since they're invariants of
//! the scoring definition rather than deployment tuning.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::lexical::tokenize;
use crate::item::MemoryItem;

/// `s_lex(i, q)` plus the additive boosts from spec §4.2.1. Returns the
/// clamped score and the list of matched boost reasons (for the
/// explanation string). `has_filters` is whether the query carried
/// non-text filters (category/tags): when the query has no tokens, a
/// filtered query still gets a `0.5` base instead of `0.0`.
pub fn lexical_score(
    query: &str,
    item: &MemoryItem,
    now: DateTime<Utc>,
    has_filters: bool,
) -> (f32, Vec<&'static str>) {
    let query_tokens: Vec<String> = tokenize(query);
    let item_tokens: BTreeSet<String> = tokenize(&item.indexed_text()).into_iter().collect();

    let mut reasons = Vec::new();

    let base = if query_tokens.is_empty() {
        if has_filters {
            0.5
        } else {
            0.0
        }
    } else {
        let matches = query_tokens
            .iter()
            .filter(|t| item_tokens.iter().any(|u| u.contains(t.as_str()) || t.contains(u.as_str())))
            .count();
        matches as f32 / query_tokens.len().max(1) as f32
    };
    let mut score = base;
    if base > 0.0 {
        reasons.push("content match");
    }

    let category_lower = item.metadata.category.to_lowercase();
    if query_tokens.iter().any(|t| category_lower.contains(t.as_str())) {
        score += 0.1;
        reasons.push("category match");
    }

    score += 0.05 * (item.metadata.priority as f32 / 10.0);

    let age = now.signed_duration_since(item.created_at);
    if age < chrono::Duration::hours(24) {
        score += 0.05;
        reasons.push("recent");
    }

    score += (item.access_count as f32 / 10.0).min(0.1);

    (score.clamp(0.0, 1.0), reasons)
}

/// Build the explanation string for a lexical-only match: concatenated
/// reasons, or `"similarity: <score>"` if none matched (spec §4.2.1).
pub fn lexical_explanation(score: f32, reasons: &[&'static str]) -> String {
    if reasons.is_empty() {
        format!("similarity: {score:.2}")
    } else {
        reasons.join(", ")
    }
}

/// Combine a lexical and a vector score for an item appearing in both
/// streams (spec §4.2.2): `0.3 * s_lex + 0.7 * s_vec`.
pub fn combine_hybrid(lexical: f32, vector: f32) -> f32 {
    (0.3 * lexical + 0.7 * vector).clamp(0.0, 1.0)
}

pub fn vector_explanation(score: f32) -> String {
    format!("semantic similarity: {score:.2}")
}
