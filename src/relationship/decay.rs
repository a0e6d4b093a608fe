//! Decay predictor (spec §4.5.5): per-memory importance, decay rate, and
//! a promote/maintain/archive/delete recommendation.
//!
//! Grounded on the teacher's `neuroscience/predictive_retrieval.rs` and
//! `consolidation/sleep.rs` for the shape of a pure-function scoring model
//! driven by a small `*Config` of named constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DecayPrediction, DecayRecommendation};
use crate::item::MemoryItem;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayConfig {
    pub half_life_days: f32,
    pub threshold: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            threshold: 0.1,
        }
    }
}

/// Predict the decay posture of `item`, given its relationship count,
/// validation score (user-confirmed accuracy of edges touching it, in
/// `[0,1]`), content relevance (most recent search score touching it, in
/// `[0,1]`), and `now`.
pub fn predict(
    item: &MemoryItem,
    relationship_count: usize,
    validation_score: f32,
    content_relevance: f32,
    config: &DecayConfig,
    now: DateTime<Utc>,
) -> DecayPrediction {
    let days_since_creation = age_days(item.created_at, now).max(0.0);
    let days_since_access = age_days(item.last_accessed_at, now).max(0.0);

    let access_freq = (item.access_count as f32 / (days_since_creation + 1.0)).min(1.0);
    let recency = (-days_since_access / 30.0).exp();
    let rel_strength = (relationship_count as f32 / 10.0).min(1.0);

    let importance = (0.3 * access_freq
        + 0.2 * recency
        + 0.2 * rel_strength
        + 0.15 * content_relevance
        + 0.15 * validation_score)
        .min(1.0);

    let ln2 = std::f32::consts::LN_2;
    let decay_rate = (ln2 / config.half_life_days)
        * (1.0 - 0.8 * (0.4 * rel_strength + 0.3 * validation_score + 0.3 * access_freq));

    let predicted_importance = importance * (-decay_rate * 30.0).exp();

    let time_to_obsolescence_days = if importance <= config.threshold {
        0.0
    } else {
        (importance / config.threshold).ln() / decay_rate
    };

    let ttl_days = item
        .metadata
        .expires_at
        .map(|exp| age_days(now, exp))
        .unwrap_or(f32::INFINITY);

    let recommendation = if predicted_importance > 1.2 * importance {
        DecayRecommendation::Promote
    } else if ttl_days < 7.0 || importance < config.threshold {
        DecayRecommendation::Delete
    } else if ttl_days < 30.0 && importance < 0.3 {
        DecayRecommendation::Archive
    } else {
        DecayRecommendation::Maintain
    };

    DecayPrediction {
        memory_id: item.id,
        importance,
        predicted_importance,
        decay_rate,
        time_to_obsolescence_days,
        access_freq,
        recency,
        rel_strength,
        recommendation,
    }
}

fn age_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f32 {
    to.signed_duration_since(from).num_seconds() as f32 / 86_400.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;

    fn fresh_item() -> MemoryItem {
        MemoryItem::new_now("content".into(), ItemMetadata::new("general", 5, "test"))
    }

    #[test]
    fn unaccessed_old_item_decays_toward_delete() {
        let mut item = fresh_item();
        let now = Utc::now();
        item.created_at = now - chrono::Duration::days(200);
        item.last_accessed_at = now - chrono::Duration::days(180);
        item.access_count = 0;

        let prediction = predict(&item, 0, 0.0, 0.0, &DecayConfig::default(), now);
        assert!(prediction.importance < DecayConfig::default().threshold);
        assert_eq!(prediction.recommendation, DecayRecommendation::Delete);
    }

    #[test]
    fn frequently_accessed_well_connected_item_is_maintained_or_promoted() {
        let mut item = fresh_item();
        let now = Utc::now();
        item.created_at = now - chrono::Duration::days(5);
        item.last_accessed_at = now;
        item.access_count = 20;

        let prediction = predict(&item, 8, 0.9, 0.9, &DecayConfig::default(), now);
        assert!(matches!(
            prediction.recommendation,
            DecayRecommendation::Maintain | DecayRecommendation::Promote
        ));
    }

    #[test]
    fn expiring_soon_item_recommends_delete() {
        let mut item = fresh_item();
        let now = Utc::now();
        item.metadata.expires_at = Some(now + chrono::Duration::days(2));
        let prediction = predict(&item, 0, 0.2, 0.2, &DecayConfig::default(), now);
        assert_eq!(prediction.recommendation, DecayRecommendation::Delete);
    }
}
