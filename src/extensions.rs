//! Extension allow-list.
//!
//! Persisted as a plain newline-delimited file. Entries are compared
//! case-insensitively and the leading dot is optional, so `JPG`, `.jpg`
//! and `.JPG` are the same entry. A single `*` entry lets every file through.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use log::info;

use crate::error::PipelineError;

/// Media types written out when no allow-list file exists yet.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".heic", ".mp4", ".mov", ".hevc", ".png", ".gif", ".tif", ".bmp", ".avi",
];

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAllowList {
    entries: BTreeSet<String>,
    allow_all: bool,
}

impl Default for ExtensionAllowList {
    fn default() -> Self {
        Self::from_entries(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl ExtensionAllowList {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self {
            entries: BTreeSet::new(),
            allow_all: false,
        };
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if entry == WILDCARD {
                list.allow_all = true;
                continue;
            }
            list.entries.insert(normalize_extension(entry));
        }
        list
    }

    /// Allows every extension, including files without one.
    pub fn allow_all() -> Self {
        Self::from_entries([WILDCARD])
    }

    /// Reads the list at `path`, writing the default list there first if the
    /// file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, PipelineError> {
        let wrap = |source: io::Error| PipelineError::AllowList {
            path: path.to_path_buf(),
            source,
        };

        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self::from_entries(contents.lines())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let list = Self::default();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(wrap)?;
                }
                fs::write(path, list.to_file_contents()).map_err(wrap)?;
                info!("Wrote default extension list to {}", path.display());
                Ok(list)
            }
            Err(err) => Err(wrap(err)),
        }
    }

    /// `extension` is expected in the normalized form produced by
    /// [`normalize_extension`]; an empty string means "no extension".
    pub fn allows(&self, extension: &str) -> bool {
        self.allow_all || self.entries.contains(extension)
    }

    pub fn is_empty(&self) -> bool {
        !self.allow_all && self.entries.is_empty()
    }

    pub fn to_file_contents(&self) -> String {
        let mut out = String::new();
        if self.allow_all {
            out.push_str(WILDCARD);
            out.push('\n');
        }
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }
}

/// Lowercases an extension and gives it exactly one leading dot.
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}
