//! Chronological ordering, histograms, and hour-bucket proximity index.
//!
//! New relative to the teacher (no `vestige-core` file does bucketed
//! histograms), grounded on the index/content separation discipline of
//! `neuroscience/hippocampal_index.rs` and the pattern-matching style of
//! `advanced/intent.rs`: the index holds only ids and derived scalars,
//! never content.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use uuid::Uuid;

/// One of the three time-of/day-of patterns `analyze_patterns` reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalPattern {
    pub kind: TemporalPatternKind,
    /// `peak_count / total_count`, in `(0.3, 1.0]` (patterns at or below
    /// 0.3 are filtered out per spec §4.1.2).
    pub strength: f32,
    /// The bucket (hour 0-23, weekday 0-6, or day-of-month 1-31) that
    /// peaked.
    pub peak_bucket: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPatternKind {
    Daily,
    Weekly,
    Monthly,
}

/// `{before[k], exact, after[k]}` partitioned around a reference instant.
#[derive(Debug, Clone, Default)]
pub struct TemporalContext {
    pub before: Vec<Uuid>,
    pub exact: Vec<Uuid>,
    pub after: Vec<Uuid>,
}

#[derive(Debug, Default)]
pub struct TemporalIndex {
    /// Chronologically ordered `(created_at, id)`, always kept sorted so
    /// range queries are a binary-search slice (spec §4.1.2).
    ordered: Vec<(DateTime<Utc>, Uuid)>,
    hour_of_day: BTreeMap<u32, u32>,
    day_of_week: BTreeMap<u32, u32>,
    day_of_month: BTreeMap<u32, u32>,
    /// "Hours since epoch" -> ids created in that hour, for proximity
    /// queries by time-of-day/day-of-week similarity.
    hour_buckets: BTreeMap<i64, Vec<Uuid>>,
}

impl TemporalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: Uuid, created_at: DateTime<Utc>) {
        let pos = self
            .ordered
            .partition_point(|(t, _)| *t < created_at);
        self.ordered.insert(pos, (created_at, id));

        *self.hour_of_day.entry(created_at.hour()).or_default() += 1;
        *self
            .day_of_week
            .entry(created_at.weekday().num_days_from_monday())
            .or_default() += 1;
        *self.day_of_month.entry(created_at.day()).or_default() += 1;

        let bucket = created_at.timestamp() / 3600;
        self.hour_buckets.entry(bucket).or_default().push(id);
    }

    pub fn remove(&mut self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(idx) = self.ordered.iter().position(|(t, i)| *i == id && *t == created_at) {
            self.ordered.remove(idx);
        }
        if let Some(c) = self.hour_of_day.get_mut(&created_at.hour()) {
            *c = c.saturating_sub(1);
        }
        if let Some(c) = self
            .day_of_week
            .get_mut(&created_at.weekday().num_days_from_monday())
        {
            *c = c.saturating_sub(1);
        }
        if let Some(c) = self.day_of_month.get_mut(&created_at.day()) {
            *c = c.saturating_sub(1);
        }
        let bucket = created_at.timestamp() / 3600;
        if let Some(ids) = self.hour_buckets.get_mut(&bucket) {
            ids.retain(|i| *i != id);
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ordered.iter().any(|(_, i)| *i == id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Binary-search slice over `[t0, t1]` (spec §4.1.2).
    pub fn range(&self, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Vec<Uuid> {
        let start = self.ordered.partition_point(|(t, _)| *t < t0);
        let end = self.ordered.partition_point(|(t, _)| *t <= t1);
        self.ordered[start..end].iter().map(|(_, id)| id).collect()
    }

    /// Oldest-first ids, used by eviction and compression passes.
    pub fn oldest_first(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.ordered.iter().map(|(_, id)| id).copied()
    }

    /// `getTemporalContext(t, window_minutes, k)` (spec §4.1.5).
    pub fn context_around(&self, t: DateTime<Utc>, window_minutes: i64, k: usize) -> TemporalContext {
        let window = chrono::Duration::minutes(window_minutes);
        let lo = t - window;
        let hi = t + window;
        let start = self.ordered.partition_point(|(ts, _)| *ts < lo);
        let end = self.ordered.partition_point(|(ts, _)| *ts <= hi);
        let mut before = Vec::new();
        let mut exact = Vec::new();
        let mut after = Vec::new();
        for (ts, id) in &self.ordered[start..end] {
            if *ts < t {
                before.push(*id);
            } else if *ts == t {
                exact.push(*id);
            } else {
                after.push(*id);
            }
        }
        if before.len() > k {
            before = before.split_off(before.len() - k);
        }
        after.truncate(k);
        TemporalContext { before, exact, after }
    }

    /// `getTemporalSimilarities(id, k)` (spec §4.1.5): ids whose
    /// `(hour-of-day, day-of-week)` is closest to the reference instant.
    pub fn similar_by_time_of_day(&self, reference: DateTime<Utc>, k: usize) -> Vec<Uuid> {
        let ref_hour = reference.hour() as i32;
        let ref_weekday = reference.weekday().num_days_from_monday() as i32;

        let mut scored: Vec<(i32, Uuid)> = self
            .ordered
            .iter()
            .map(|(ts, id)| {
                let hour_dist = (ts.hour() as i32 - ref_hour).abs().min(24 - (ts.hour() as i32 - ref_hour).abs());
                let weekday_dist = (ts.weekday().num_days_from_monday() as i32 - ref_weekday).abs();
                (hour_dist * 7 + weekday_dist, *id)
            })
            .collect();
        scored.sort_by_key(|(dist, _)| *dist);
        scored.into_iter().take(k).map(|(_, id)| id).collect()
    }

    /// Up to three patterns (daily/weekly/monthly) with `strength > 0.3`
    /// (spec §4.1.2).
    pub fn analyze_patterns(&self) -> Vec<TemporalPattern> {
        let total = self.ordered.len().max(1) as f32;
        let mut patterns = Vec::new();
        if let Some((bucket, count)) = self.hour_of_day.iter().max_by_key(|(_, c)| **c) {
            let strength = *count as f32 / total;
            if strength > 0.3 {
                patterns.push(TemporalPattern {
                    kind: TemporalPatternKind::Daily,
                    strength,
                    peak_bucket: *bucket,
                });
            }
        }
        if let Some((bucket, count)) = self.day_of_week.iter().max_by_key(|(_, c)| **c) {
            let strength = *count as f32 / total;
            if strength > 0.3 {
                patterns.push(TemporalPattern {
                    kind: TemporalPatternKind::Weekly,
                    strength,
                    peak_bucket: *bucket,
                });
            }
        }
        if let Some((bucket, count)) = self.day_of_month.iter().max_by_key(|(_, c)| **c) {
            let strength = *count as f32 / total;
            if strength > 0.3 {
                patterns.push(TemporalPattern {
                    kind: TemporalPatternKind::Monthly,
                    strength,
                    peak_bucket: *bucket,
                });
            }
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn range_query_is_inclusive_slice() {
        let mut idx = TemporalIndex::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        idx.insert(a, at(2024, 1, 1, 0));
        idx.insert(b, at(2024, 6, 1, 0));
        idx.insert(c, at(2024, 12, 1, 0));

        let result = idx.range(at(2024, 1, 1, 0), at(2024, 6, 1, 0));
        assert_eq!(result, vec![a, b]);
    }

    #[test]
    fn remove_drops_from_ordered_sequence() {
        let mut idx = TemporalIndex::new();
        let id = Uuid::new_v4();
        let ts = at(2024, 1, 1, 0);
        idx.insert(id, ts);
        assert!(idx.contains(id));
        idx.remove(id, ts);
        assert!(!idx.contains(id));
    }

    #[test]
    fn context_around_partitions_before_exact_after() {
        let mut idx = TemporalIndex::new();
        let ref_time = at(2024, 1, 1, 12);
        let before = Uuid::new_v4();
        let exact = Uuid::new_v4();
        let after = Uuid::new_v4();
        idx.insert(before, at(2024, 1, 1, 11));
        idx.insert(exact, ref_time);
        idx.insert(after, at(2024, 1, 1, 13));

        let ctx = idx.context_around(ref_time, 120, 5);
        assert_eq!(ctx.before, vec![before]);
        assert_eq!(ctx.exact, vec![exact]);
        assert_eq!(ctx.after, vec![after]);
    }

    #[test]
    fn analyze_patterns_filters_weak_strength() {
        let mut idx = TemporalIndex::new();
        for day in 1..=4 {
            idx.insert(Uuid::new_v4(), at(2024, 1, day, 9));
        }
        idx.insert(Uuid::new_v4(), at(2024, 1, 10, 15));
        let patterns = idx.analyze_patterns();
        assert!(patterns
            .iter()
            .any(|p| p.kind == TemporalPatternKind::Daily && p.strength > 0.3));
    }
}
