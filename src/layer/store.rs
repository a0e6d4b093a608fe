//! Authoritative item storage for one layer.
//!
//! Grounded on the teacher's `Storage` pattern in `storage/sqlite.rs`:
//! interior mutability behind a lock, `&self`-only methods, so a layer is
//! `Send + Sync` and can be shared as `Arc<Layer>` rather than
//! `Arc<Mutex<Layer>>` at the router level. Here the lock is a
//! `tokio::sync::RwLock` around an ordered map, since there is no
//! database connection to hide behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::item::MemoryItem;

/// In-memory owner of a layer's items, keyed by id, insertion-ordered by
/// `BTreeMap`'s key order only incidentally (eviction order comes from
/// `last_accessed_at`, tracked separately below).
#[derive(Debug, Default)]
pub struct ItemStore {
    items: BTreeMap<Uuid, MemoryItem>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.items.values().map(|i| i.approx_size_bytes()).sum()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.contains_key(&id)
    }

    pub fn insert(&mut self, item: MemoryItem) {
        self.items.insert(item.id, item);
    }

    /// Read-only peek, no access-count side effect (used internally by
    /// search/eviction, never exposed as the public `retrieve`).
    pub fn peek(&self, id: Uuid) -> Option<&MemoryItem> {
        self.items.get(&id)
    }

    /// `retrieve` semantics: bumps `access_count`/`last_accessed_at` on
    /// hit, no side effect on miss (spec §4.1).
    pub fn retrieve(&mut self, id: Uuid, now: DateTime<Utc>) -> Option<MemoryItem> {
        let item = self.items.get_mut(&id)?;
        item.record_access(now);
        Some(item.clone())
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut MemoryItem> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<MemoryItem> {
        self.items.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryItem> {
        self.items.values()
    }

    pub fn all_ids(&self) -> Vec<Uuid> {
        self.items.keys().copied().collect()
    }

    /// Ids ordered ascending by `last_accessed_at` (eviction order, spec
    /// §4.1.3).
    pub fn ids_by_ascending_last_access(&self) -> Vec<Uuid> {
        let mut ids: Vec<(DateTime<Utc>, Uuid)> = self
            .items
            .values()
            .map(|i| (i.last_accessed_at, i.id))
            .collect();
        ids.sort_by_key(|(t, _)| *t);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn export_all(&self) -> Vec<MemoryItem> {
        self.items.values().cloned().collect()
    }

    pub fn replace_all(&mut self, items: Vec<MemoryItem>) {
        self.items = items.into_iter().map(|i| (i.id, i)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;

    fn sample() -> MemoryItem {
        MemoryItem::new_now("hello".into(), ItemMetadata::new("general", 5, "user"))
    }

    #[test]
    fn retrieve_bumps_access_count_on_hit() {
        let mut store = ItemStore::new();
        let item = sample();
        let id = item.id;
        store.insert(item);
        let now = Utc::now();
        let retrieved = store.retrieve(id, now).unwrap();
        assert_eq!(retrieved.access_count, 1);
    }

    #[test]
    fn retrieve_on_miss_has_no_side_effect() {
        let mut store = ItemStore::new();
        assert!(store.retrieve(Uuid::new_v4(), Utc::now()).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn eviction_order_is_ascending_last_access() {
        let mut store = ItemStore::new();
        let mut a = sample();
        a.last_accessed_at = Utc::now() - chrono::Duration::hours(3);
        let mut b = sample();
        b.last_accessed_at = Utc::now() - chrono::Duration::hours(1);
        let (a_id, b_id) = (a.id, b.id);
        store.insert(b);
        store.insert(a);
        let ordered = store.ids_by_ascending_last_access();
        assert_eq!(ordered, vec![a_id, b_id]);
    }
}
