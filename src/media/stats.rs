use super::{ORIGINALS_DIR, VARIANTS_DIR};
use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub total_bytes: u64,
    pub file_count: u64,
    pub original_bytes: u64,
    pub original_count: u64,
    pub variant_bytes: u64,
    pub variant_count: u64,
}

/// Disk usage under an upload root. A missing root counts as empty.
pub fn storage_stats(root: &Path) -> Result<StorageStats> {
    let mut stats = StorageStats::default();
    if !root.exists() {
        return Ok(stats);
    }

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("failed to walk {}: {e}", root.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        stats.total_bytes += size;
        stats.file_count += 1;

        let top = entry
            .path()
            .strip_prefix(root)
            .ok()
            .and_then(|p| p.components().next())
            .and_then(|c| c.as_os_str().to_str());
        match top {
            Some(ORIGINALS_DIR) => {
                stats.original_bytes += size;
                stats.original_count += 1;
            }
            Some(VARIANTS_DIR) => {
                stats.variant_bytes += size;
                stats.variant_count += 1;
            }
            _ => {}
        }
    }
    Ok(stats)
}
