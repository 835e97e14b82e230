//! Recursive file enumeration.
//!
//! [`TreeWalker`] is a lazy iterator over every regular file below a root.
//! Symbolic links are followed, so a linked photo is yielded under the
//! link's path and hashed through its target. Directories are counted as
//! they are entered. Entries that cannot be read, broken links and link
//! loops included, are logged, recorded in [`WalkStats::errors`] and
//! skipped; a root that cannot be opened simply yields nothing.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

/// One entry the walk could not visit.
#[derive(Debug, Clone)]
pub struct WalkEntryError {
    /// Missing when walkdir cannot attribute the error to a path.
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Counters for one walk, filled in as the iterator advances.
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    /// Regular files yielded, linked ones included.
    pub files: usize,
    /// Directories entered, the root included.
    pub directories: usize,
    /// Entries the walk had to skip, in the order they were met.
    pub errors: Vec<WalkEntryError>,
}

pub struct TreeWalker {
    entries: walkdir::IntoIter,
    stats: WalkStats,
}

impl TreeWalker {
    pub fn new(root: &Path) -> Self {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            entries: WalkDir::new(root).follow_links(true).into_iter(),
            stats: WalkStats::default(),
        }
    }

    /// Drains the walk, returning every file path together with the counters.
    pub fn collect_all(mut self) -> (Vec<PathBuf>, WalkStats) {
        let paths: Vec<PathBuf> = self.by_ref().collect();
        (paths, self.stats)
    }
}

impl Iterator for TreeWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.entries.next()? {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        self.stats.directories += 1;
                    } else if file_type.is_file() {
                        self.stats.files += 1;
                        return Some(entry.into_path());
                    } else {
                        debug!("Ignoring special file {}", entry.path().display());
                    }
                }
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    match &path {
                        Some(p) => warn!("Skipping {}: {}", p.display(), err),
                        None => warn!("Skipping unreadable entry: {}", err),
                    }
                    self.stats.errors.push(WalkEntryError {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}
