//! Human-in-the-loop validation queue for auto-detected relationships
//! (spec §4.6). Grounded on the teacher's triage/queue-with-status-
//! transitions pattern in `consolidation/phases.rs`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{RelationshipSuggestion, RelationshipType, SuggestionStatus};
use crate::error::{EngineError, Result};

const TRUST_STEP: f32 = 0.05;
const TYPE_PREFERENCE_STEP: f32 = 0.03;
const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// A user's learned preferences, updated on every validation action.
#[derive(Debug, Clone)]
pub struct UserPreferences {
    pub confidence_threshold: f32,
    pub algorithm_trust: BTreeMap<String, f32>,
    pub type_preference: BTreeMap<RelationshipType, f32>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            algorithm_trust: BTreeMap::new(),
            type_preference: BTreeMap::new(),
        }
    }
}

impl UserPreferences {
    fn nudge(&mut self, algorithm: &str, kind: RelationshipType, positive: bool) {
        let trust = self.algorithm_trust.entry(algorithm.to_string()).or_insert(0.5);
        let type_pref = self.type_preference.entry(kind).or_insert(0.5);
        let trust_delta = if positive { TRUST_STEP } else { -TRUST_STEP };
        let type_delta = if positive { TYPE_PREFERENCE_STEP } else { -TYPE_PREFERENCE_STEP };
        *trust = (*trust + trust_delta).clamp(0.0, 1.0);
        *type_pref = (*type_pref + type_delta).clamp(0.0, 1.0);
    }

    fn priority_score(&self, suggestion: &RelationshipSuggestion) -> f32 {
        let trust = self
            .algorithm_trust
            .get(&suggestion.algorithm)
            .copied()
            .unwrap_or(0.5);
        let type_pref = self
            .type_preference
            .get(&suggestion.relationship.kind)
            .copied()
            .unwrap_or(0.5);
        let meets_threshold = if suggestion.confidence >= self.confidence_threshold {
            1.0
        } else {
            0.0
        };
        0.5 * meets_threshold + 0.3 * type_pref + 0.2 * trust
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationAction {
    Confirm,
    Reject,
}

#[derive(Debug, Default)]
pub struct ValidationQueue {
    pending: Vec<RelationshipSuggestion>,
    history: Vec<RelationshipSuggestion>,
    preferences: BTreeMap<String, UserPreferences>,
}

impl ValidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, suggestion: RelationshipSuggestion) {
        self.pending.push(suggestion);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn preferences_for(&mut self, user_id: &str) -> &mut UserPreferences {
        self.preferences.entry(user_id.to_string()).or_default()
    }

    fn take_pending(&mut self, suggestion_id: Uuid) -> Result<RelationshipSuggestion> {
        let idx = self
            .pending
            .iter()
            .position(|s| s.id == suggestion_id)
            .ok_or_else(|| EngineError::NotFound(format!("relationship suggestion {suggestion_id}")))?;
        Ok(self.pending.remove(idx))
    }

    pub fn confirm(&mut self, user_id: &str, suggestion_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut suggestion = self.take_pending(suggestion_id)?;
        suggestion.status = SuggestionStatus::Confirmed;
        suggestion.validated_at = Some(now);
        self.preferences_for(user_id)
            .nudge(&suggestion.algorithm, suggestion.relationship.kind, true);
        self.history.push(suggestion);
        Ok(())
    }

    pub fn reject(&mut self, user_id: &str, suggestion_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut suggestion = self.take_pending(suggestion_id)?;
        suggestion.status = SuggestionStatus::Rejected;
        suggestion.validated_at = Some(now);
        self.preferences_for(user_id)
            .nudge(&suggestion.algorithm, suggestion.relationship.kind, false);
        self.history.push(suggestion);
        Ok(())
    }

    pub fn modify(
        &mut self,
        user_id: &str,
        suggestion_id: Uuid,
        new_type: Option<RelationshipType>,
        new_confidence: Option<f32>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut suggestion = self.take_pending(suggestion_id)?;
        suggestion.status = SuggestionStatus::Modified;
        suggestion.validated_at = Some(now);
        suggestion.modified_type = new_type;
        suggestion.modified_confidence = new_confidence.map(|c| c.clamp(0.0, 1.0));
        let effective_kind = new_type.unwrap_or(suggestion.relationship.kind);
        self.preferences_for(user_id)
            .nudge(&suggestion.algorithm, effective_kind, true);
        self.history.push(suggestion);
        Ok(())
    }

    pub fn batch_validate(
        &mut self,
        user_id: &str,
        ids: &[Uuid],
        action: ValidationAction,
        now: DateTime<Utc>,
    ) -> Vec<Result<()>> {
        ids.iter()
            .map(|id| match action {
                ValidationAction::Confirm => self.confirm(user_id, *id, now),
                ValidationAction::Reject => self.reject(user_id, *id, now),
            })
            .collect()
    }

    /// `getSmartSuggestions`: pending suggestions ranked by a priority score
    /// combining the user's confidence threshold, type preference and
    /// algorithm trust (spec §4.6).
    pub fn smart_suggestions(&self, user_id: &str, limit: usize) -> Vec<&RelationshipSuggestion> {
        let prefs = self.preferences.get(user_id).cloned().unwrap_or_default();
        let mut ranked: Vec<&RelationshipSuggestion> = self.pending.iter().collect();
        ranked.sort_by(|a, b| {
            prefs
                .priority_score(b)
                .partial_cmp(&prefs.priority_score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit.max(1));
        ranked
    }

    /// Remove history entries older than `max_age_days` (default 30).
    pub fn cleanup(&mut self, now: DateTime<Utc>, max_age_days: Option<i64>) -> usize {
        let max_age = chrono::Duration::days(max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS));
        let before = self.history.len();
        self.history.retain(|s| {
            s.validated_at
                .map(|t| now.signed_duration_since(t) < max_age)
                .unwrap_or(true)
        });
        before - self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::types::MemoryRelationship;

    fn suggestion(algorithm: &str, kind: RelationshipType, confidence: f32) -> RelationshipSuggestion {
        let relationship = MemoryRelationship::new(Uuid::new_v4(), Uuid::new_v4(), kind, confidence, 0.6, algorithm);
        RelationshipSuggestion {
            id: Uuid::new_v4(),
            relationship,
            source_content: "a".into(),
            target_content: "b".into(),
            status: SuggestionStatus::Pending,
            suggested_at: Utc::now(),
            validated_at: None,
            user_feedback: None,
            modified_type: None,
            modified_confidence: None,
            algorithm: algorithm.to_string(),
            confidence,
        }
    }

    #[test]
    fn confirm_moves_to_history_and_raises_trust() {
        let mut queue = ValidationQueue::new();
        let s = suggestion("reference_detector", RelationshipType::Reference, 0.9);
        let id = s.id;
        queue.enqueue(s);

        queue.confirm("alice", id, Utc::now()).unwrap();
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.history.len(), 1);
        let trust = queue.preferences["alice"].algorithm_trust["reference_detector"];
        assert!(trust > 0.5);
    }

    #[test]
    fn reject_lowers_trust() {
        let mut queue = ValidationQueue::new();
        let s = suggestion("causal_detector", RelationshipType::Causal, 0.7);
        let id = s.id;
        queue.enqueue(s);

        queue.reject("bob", id, Utc::now()).unwrap();
        let trust = queue.preferences["bob"].algorithm_trust["causal_detector"];
        assert!(trust < 0.5);
    }

    #[test]
    fn confirm_missing_id_is_not_found() {
        let mut queue = ValidationQueue::new();
        let err = queue.confirm("alice", Uuid::new_v4(), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn cleanup_drops_old_history() {
        let mut queue = ValidationQueue::new();
        let s = suggestion("reference_detector", RelationshipType::Reference, 0.9);
        let id = s.id;
        queue.enqueue(s);
        let now = Utc::now();
        queue.confirm("alice", id, now - chrono::Duration::days(40)).unwrap();

        let removed = queue.cleanup(now, None);
        assert_eq!(removed, 1);
    }

    #[test]
    fn smart_suggestions_prefers_higher_priority_score() {
        let mut queue = ValidationQueue::new();
        let low = suggestion("reference_detector", RelationshipType::Reference, 0.4);
        let high = suggestion("reference_detector", RelationshipType::Reference, 0.9);
        let high_id = high.id;
        queue.enqueue(low);
        queue.enqueue(high);

        let ranked = queue.smart_suggestions("alice", 5);
        assert_eq!(ranked[0].id, high_id);
    }
}
