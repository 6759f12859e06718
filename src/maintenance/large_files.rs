use crate::error::Result;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const SKIPPED_DIRS: &[&str] = &["target", ".git", "node_modules"];

#[derive(Debug, Clone)]
pub struct LargeFileOptions {
    pub min_lines: usize,
    pub limit: usize,
    pub extensions: Vec<String>,
}

impl Default for LargeFileOptions {
    fn default() -> Self {
        Self {
            min_lines: 500,
            limit: 20,
            extensions: vec!["rs".into(), "toml".into(), "md".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeFile {
    /// Relative to the scanned root
    pub path: PathBuf,
    pub lines: usize,
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Source files with at least `min_lines` lines, biggest first.
pub fn find_large_files(root: &Path, options: &LargeFileOptions) -> Result<Vec<LargeFile>> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| !is_skipped(e));
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let wanted = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| options.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)));
        if !wanted {
            continue;
        }

        let bytes = std::fs::read(entry.path())?;
        let lines = String::from_utf8_lossy(&bytes).lines().count();
        if lines >= options.min_lines {
            let path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            debug!("{} has {} lines", path.display(), lines);
            found.push(LargeFile { path, lines });
        }
    }

    found.sort_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.path.cmp(&b.path)));
    found.truncate(options.limit);
    Ok(found)
}
