//! Versioned snapshot persistence: `items.<version>.json` plus timestamped
//! backups, written tmp-then-rename so readers never observe a partial
//! file (spec §5, §6). Grounded on the teacher's tmp-then-rename
//! discipline described around `storage/sqlite.rs`'s connection handling,
//! generalized here since this engine's layout is its own JSON format
//! rather than a SQLite file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::MemoryItem;

/// Bumped only if the on-disk shape changes incompatibly. Loaders refuse
/// a snapshot whose version is newer than they understand.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("(de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot format version {found} is newer than the {supported} this build understands")]
    UnsupportedVersion { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub items: Vec<MemoryItem>,
}

impl LayerSnapshot {
    pub fn new(items: Vec<MemoryItem>) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            items,
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `<data_dir>/<layer>/items.<version>.json`.
pub fn save_items(layer_dir: &Path, snapshot: &LayerSnapshot) -> Result<()> {
    let path = layer_dir.join(format!("items.{}.json", snapshot.version));
    let json = serde_json::to_string_pretty(snapshot)?;
    write_atomic(&path, &json)
}

/// Load the highest-versioned `items.*.json` file in `layer_dir`, if any.
/// Per spec §5/§7, a missing or unreadable snapshot is not fatal at
/// startup: callers interpret `Ok(None)` as "start empty" and log a
/// warning themselves.
pub fn load_latest_items(layer_dir: &Path) -> Result<Option<LayerSnapshot>> {
    if !layer_dir.exists() {
        return Ok(None);
    }
    let mut candidates: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(layer_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("items.") {
            if let Some(version_str) = rest.strip_suffix(".json") {
                if let Ok(version) = version_str.parse::<u32>() {
                    candidates.push((version, entry.path()));
                }
            }
        }
    }
    candidates.sort_by_key(|(v, _)| *v);
    let Some((version, path)) = candidates.into_iter().last() else {
        return Ok(None);
    };
    if version > SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }
    let contents = std::fs::read_to_string(&path)?;
    let snapshot: LayerSnapshot = serde_json::from_str(&contents)?;
    Ok(Some(snapshot))
}

/// Write `<data_dir>/<layer>/backups/<backup_id>.json` and return the id.
pub fn write_backup(layer_dir: &Path, items: &[MemoryItem]) -> Result<Uuid> {
    let backup_id = Uuid::new_v4();
    let path = layer_dir
        .join("backups")
        .join(format!("{backup_id}.json"));
    let snapshot = LayerSnapshot::new(items.to_vec());
    let json = serde_json::to_string_pretty(&snapshot)?;
    write_atomic(&path, &json)?;
    Ok(backup_id)
}

/// Read back a previously written backup by id.
pub fn read_backup(layer_dir: &Path, backup_id: Uuid) -> Result<LayerSnapshot> {
    let path = layer_dir
        .join("backups")
        .join(format!("{backup_id}.json"));
    let contents = std::fs::read_to_string(&path)?;
    let snapshot: LayerSnapshot = serde_json::from_str(&contents)?;
    if snapshot.version > SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }
    Ok(snapshot)
}
