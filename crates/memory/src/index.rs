//! Memory search index
//!
//! A single JSON array of recent run entries, newest first, capped so the
//! file stays cheap to read whole. The pipeline is the only writer, so a
//! read-modify-write with an atomic rename is sufficient.

use routeqa_common::types::MemoryIndexEntry;
use routeqa_common::Result;
use std::path::Path;

pub const INDEX_CAP: usize = 100;

/// Load the index; a missing file is an empty index
pub fn load(path: &Path) -> Result<Vec<MemoryIndexEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let entries = serde_json::from_str(&content)?;
    Ok(entries)
}

/// Append an entry, keeping the index sorted newest-first and capped.
///
/// The file is replaced via a temp-write and rename so a crash mid-write
/// never leaves a truncated index behind.
pub fn append(path: &Path, entry: MemoryIndexEntry) -> Result<()> {
    let mut entries = load(path)?;
    entries.push(entry);
    entries.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    entries.truncate(INDEX_CAP);
    persist(path, &entries)
}

fn persist(path: &Path, entries: &[MemoryIndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
