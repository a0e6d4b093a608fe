//! Cross-layer merge and composite re-rank (spec §4.2.3).

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::config::RankingWeights;
use crate::item::MemoryLayer;
use crate::layer::SearchResult;

/// Merge per-layer hits keyed by item id, keeping the highest single-layer
/// score and breaking ties by layer priority (`session > project > global
/// > temporal`), then re-rank by the weighted composite and truncate.
pub fn merge_and_rank(
    per_layer: Vec<Vec<SearchResult>>,
    weights: &RankingWeights,
    limit: usize,
) -> Vec<SearchResult> {
    let mut best: HashMap<Uuid, SearchResult> = HashMap::new();

    for hits in per_layer {
        for hit in hits {
            match best.get(&hit.item.id) {
                None => {
                    best.insert(hit.item.id, hit);
                }
                Some(existing) => {
                    let replace = hit.score > existing.score
                        || (hit.score == existing.score
                            && hit.source_layer.merge_priority() < existing.source_layer.merge_priority());
                    if replace {
                        best.insert(hit.item.id, hit);
                    }
                }
            }
        }
    }

    let now = Utc::now();
    let mut ranked: Vec<SearchResult> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        composite(b, weights, now)
            .partial_cmp(&composite(a, weights, now))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit.max(1));
    ranked
}

fn composite(result: &SearchResult, weights: &RankingWeights, now: chrono::DateTime<Utc>) -> f32 {
    let age_hours = now
        .signed_duration_since(result.item.created_at)
        .num_seconds()
        .max(0) as f32
        / 3600.0;
    let recency = (-age_hours / 168.0).exp();
    let frequency = (result.item.access_count as f32 / 10.0).min(1.0);
    let priority = result.item.metadata.priority as f32 / 10.0;

    weights.relevance * result.score
        + weights.recency * recency
        + weights.frequency * frequency
        + weights.priority * priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemMetadata, MemoryItem};

    fn result(score: f32, layer: MemoryLayer) -> SearchResult {
        SearchResult {
            item: MemoryItem::new_now("x".into(), ItemMetadata::new("general", 5, "test")),
            score,
            source_layer: layer,
            explanation: String::new(),
        }
    }

    #[test]
    fn duplicate_id_keeps_highest_score() {
        let mut a = result(0.4, MemoryLayer::Project);
        let mut b = result(0.9, MemoryLayer::Global);
        b.item.id = a.item.id;
        a.item.created_at = b.item.created_at;

        let merged = merge_and_rank(vec![vec![a], vec![b]], &RankingWeights::default(), 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_layer, MemoryLayer::Global);
    }

    #[test]
    fn tie_breaks_by_layer_priority() {
        let id = Uuid::new_v4();
        let mut a = result(0.5, MemoryLayer::Temporal);
        let mut b = result(0.5, MemoryLayer::Session);
        a.item.id = id;
        b.item.id = id;
        b.item.created_at = a.item.created_at;

        let merged = merge_and_rank(vec![vec![a], vec![b]], &RankingWeights::default(), 10);
        assert_eq!(merged[0].source_layer, MemoryLayer::Session);
    }

    #[test]
    fn truncates_to_limit() {
        let hits: Vec<SearchResult> = (0..5).map(|_| result(0.5, MemoryLayer::Project)).collect();
        let merged = merge_and_rank(vec![hits], &RankingWeights::default(), 3);
        assert_eq!(merged.len(), 3);
    }
}
