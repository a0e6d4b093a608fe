//! Dense-vector index with an exact -> approximate (IVF) transition.
//!
//! Grounded structurally on the teacher's `search/vector.rs::VectorIndex`
//! (same public surface: `add`/`remove`/`contains`/`search`/
//! `search_with_threshold`/`save`/`load`/`stats`, same error-enum shape)
//! with USearch's bundled HNSW replaced by an in-house exact-array plus
//! k-means-trained IVF, per the state machine in spec §4.3. Centroid
//! seeding uses `rand`, grounded on the wider retrieval pack's use of that
//! crate for this class of numeric work (the teacher has no k-means of
//! its own — it delegates ANN entirely to USearch).

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::cosine_similarity;

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },
    #[error("persistence failed: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    Exact,
    Approximate,
}

#[derive(Debug, Clone)]
pub struct VectorIndexStats {
    pub total_vectors: usize,
    pub dimensions: usize,
    pub state: IndexState,
    pub nlist: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    id: Uuid,
    vector: Vec<f32>,
    /// Index into `centroids`, set only once `state == Approximate`.
    centroid: Option<usize>,
    tombstoned: bool,
}

/// On-disk representation; round-trips state, centroids and assignments
/// (spec §4.3 "save/load must round-trip state, centroids, and
/// assignments").
#[derive(Debug, Serialize, Deserialize)]
struct VectorIndexSnapshot {
    dimensions: usize,
    n_ivf: usize,
    nlist: usize,
    nprobe: usize,
    state: IndexState,
    centroids: Vec<Vec<f32>>,
    entries: Vec<Entry>,
}

/// Exact brute-force cosine below `n_ivf`; IVF coarse-quantized cosine
/// above it. Tombstone-then-compact removal (spec §4.3).
pub struct VectorIndex {
    dimensions: usize,
    n_ivf: usize,
    nlist: usize,
    nprobe: usize,
    state: IndexState,
    centroids: Vec<Vec<f32>>,
    entries: Vec<Entry>,
    live_count: usize,
}

impl VectorIndex {
    pub fn new(dimensions: usize, n_ivf: usize, nlist: usize, nprobe: usize) -> Self {
        Self {
            dimensions,
            n_ivf,
            nlist,
            nprobe,
            state: IndexState::Exact,
            centroids: Vec::new(),
            entries: Vec::new(),
            live_count: 0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    fn validate_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(VectorIndexError::InvalidDimensions {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Adding a vector whose id already exists replaces the prior vector,
    /// never duplicating it (spec §4.3 invariant).
    pub fn add(&mut self, id: Uuid, vector: Vec<f32>) -> Result<()> {
        self.validate_dims(&vector)?;
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == id && !e.tombstoned) {
            existing.vector = vector;
            existing.centroid = None;
            return Ok(());
        }
        self.entries.push(Entry {
            id,
            vector,
            centroid: None,
            tombstoned: false,
        });
        self.live_count += 1;
        if self.state == IndexState::Exact && self.live_count >= self.n_ivf {
            self.train_ivf();
        } else if self.state == IndexState::Approximate {
            let idx = self.entries.len() - 1;
            let centroid = self.nearest_centroid(&self.entries[idx].vector);
            self.entries[idx].centroid = Some(centroid);
        }
        Ok(())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.iter().any(|e| e.id == id && !e.tombstoned)
    }

    /// Tombstone; physically compacted at the next `optimize()` call.
    pub fn remove(&mut self, id: Uuid) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id && !e.tombstoned) {
            entry.tombstoned = true;
            self.live_count -= 1;
            true
        } else {
            false
        }
    }

    /// Physically drop tombstoned entries and, if approximate, retrain
    /// centroids against the surviving set.
    pub fn optimize(&mut self) {
        self.entries.retain(|e| !e.tombstoned);
        if self.state == IndexState::Approximate {
            self.train_ivf();
        }
    }

    fn nearest_centroid(&self, vector: &[f32]) -> usize {
        self.centroids
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                cosine_similarity(vector, a)
                    .partial_cmp(&cosine_similarity(vector, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    /// Train a `nlist`-centroid k-means quantizer over the live vectors
    /// and assign each to its nearest centroid (spec §4.3 transition).
    fn train_ivf(&mut self) {
        let live: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.tombstoned)
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            return;
        }
        let k = self.nlist.min(live.len());
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut seed_indices: Vec<usize> = live.clone();
        seed_indices.shuffle(&mut rng);
        self.centroids = seed_indices
            .into_iter()
            .take(k)
            .map(|i| self.entries[i].vector.clone())
            .collect();

        const MAX_ITERS: usize = 10;
        for _ in 0..MAX_ITERS {
            let mut assignments = vec![Vec::new(); self.centroids.len()];
            for &i in &live {
                let c = self.nearest_centroid(&self.entries[i].vector);
                assignments[c].push(i);
            }
            let mut moved = false;
            for (c, members) in assignments.iter().enumerate() {
                if members.is_empty() {
                    continue;
                }
                let dim = self.dimensions;
                let mut mean = vec![0f32; dim];
                for &i in members {
                    for (d, v) in self.entries[i].vector.iter().enumerate() {
                        mean[d] += v;
                    }
                }
                for v in &mut mean {
                    *v /= members.len() as f32;
                }
                if mean != self.centroids[c] {
                    moved = true;
                }
                self.centroids[c] = mean;
            }
            if !moved {
                break;
            }
        }

        for &i in &live {
            let c = self.nearest_centroid(&self.entries[i].vector);
            self.entries[i].centroid = Some(c);
        }
        self.state = IndexState::Approximate;
    }

    /// Cosine search. Exact state scans every live vector; approximate
    /// state probes the `nprobe` nearest centroids only.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>> {
        self.validate_dims(query)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let candidates: Box<dyn Iterator<Item = &Entry>> = match self.state {
            IndexState::Exact => Box::new(self.entries.iter().filter(|e| !e.tombstoned)),
            IndexState::Approximate => {
                let mut ranked: Vec<(usize, f32)> = self
                    .centroids
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (i, cosine_similarity(query, c)))
                    .collect();
                ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                let probe: std::collections::HashSet<usize> =
                    ranked.into_iter().take(self.nprobe).map(|(i, _)| i).collect();
                Box::new(
                    self.entries
                        .iter()
                        .filter(move |e| !e.tombstoned && e.centroid.is_some_and(|c| probe.contains(&c))),
                )
            }
        };

        let mut scored: Vec<(Uuid, f32)> = candidates
            .map(|e| (e.id, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Restricted to `s_vec >= 0.3` per spec §4.2.2's hybrid scoring cutoff.
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<(Uuid, f32)>> {
        let results = self.search(query, self.len().max(limit))?;
        Ok(results
            .into_iter()
            .filter(|(_, score)| *score >= min_similarity)
            .take(limit)
            .collect())
    }

    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.dimensions,
            state: self.state,
            nlist: self.centroids.len(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = VectorIndexSnapshot {
            dimensions: self.dimensions,
            n_ivf: self.n_ivf,
            nlist: self.nlist,
            nprobe: self.nprobe,
            state: self.state,
            centroids: self.centroids.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| VectorIndexError::Persistence(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| VectorIndexError::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| VectorIndexError::Persistence(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| VectorIndexError::Persistence(e.to_string()))?;
        let snapshot: VectorIndexSnapshot =
            serde_json::from_str(&json).map_err(|e| VectorIndexError::Persistence(e.to_string()))?;
        let live_count = snapshot.entries.iter().filter(|e| !e.tombstoned).count();
        Ok(Self {
            dimensions: snapshot.dimensions,
            n_ivf: snapshot.n_ivf,
            nlist: snapshot.nlist,
            nprobe: snapshot.nprobe,
            state: snapshot.state,
            centroids: snapshot.centroids,
            entries: snapshot.entries,
            live_count,
        })
    }
}
