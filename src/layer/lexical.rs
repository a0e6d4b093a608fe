//! Inverted token index: `token -> set<item id>`.
//!
//! Tokenization matches spec §4.1.1 exactly: lowercase, replace non-word
//! characters with whitespace, split, discard tokens of length ≤ 2.
//! Grounded structurally on the teacher's FTS5-sanitization mindset in
//! `search/keyword.rs`, reimplemented as an in-process posting map since
//! this system has no SQL engine underneath it.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

/// Tokenize text the way both indexing and querying must (spec §4.1.1).
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// A posting-list inverted index owned exclusively by one layer.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    postings: BTreeMap<String, BTreeSet<Uuid>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `text` under `id`. Updates are always remove-then-insert
    /// (spec §4.1.1); callers must call `remove` first if `id` was
    /// already indexed under different text.
    pub fn insert(&mut self, id: Uuid, text: &str) {
        for token in tokenize(text) {
            self.postings.entry(token).or_default().insert(id);
        }
    }

    /// Remove every posting for `id`. Idempotent.
    pub fn remove(&mut self, id: Uuid) {
        self.postings.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
    }

    /// Reindex: equivalent to `remove` then `insert` with new text.
    pub fn reindex(&mut self, id: Uuid, text: &str) {
        self.remove(id);
        self.insert(id, text);
    }

    /// True if `id` has at least one posting (used by the index-
    /// consistency invariant in tests).
    pub fn contains(&self, id: Uuid) -> bool {
        self.postings.values().any(|ids| ids.contains(&id))
    }

    /// All ids carrying at least one token in `token`'s posting list.
    pub fn ids_for_token(&self, token: &str) -> BTreeSet<Uuid> {
        self.postings.get(token).cloned().unwrap_or_default()
    }

    /// Tokens whose postings contain a word either a substring of or
    /// containing `token` (spec's "t ⊂ u ∨ u ⊂ t" substring match).
    pub fn matching_ids(&self, token: &str) -> BTreeSet<Uuid> {
        let mut out = BTreeSet::new();
        for (candidate, ids) in &self.postings {
            if candidate.contains(token) || token.contains(candidate.as_str()) {
                out.extend(ids.iter().copied());
            }
        }
        out
    }

    pub fn token_count(&self) -> usize {
        self.postings.len()
    }
}
