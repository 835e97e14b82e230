use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::extensions::ExtensionAllowList;

/// Whether placement leaves the source in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    /// Write a new file and leave the source alone.
    #[default]
    Copy,
    /// Rename into place, copying when a rename is not possible.
    Move,
}

/// How destination filenames are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingPolicy {
    /// `YYYY-MM-DD HHMMSS-<hash><ext>`
    #[default]
    Rename,
    /// Original file name, with `_2`, `_3`, ... appended on collision.
    KeepName,
}

/// Which record inside a hash group gets placed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representative {
    /// Whichever copy finished hashing first. Not stable across runs.
    #[default]
    First,
    /// The copy with the earliest effective timestamp.
    Oldest,
    /// The copy with the lexicographically smallest source path.
    Path,
}

/// Where the effective timestamp comes from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampSource {
    /// Earliest of the filesystem creation/access/modification times.
    #[default]
    Filesystem,
    /// EXIF capture date when the file carries one, filesystem otherwise.
    Exif,
}

/// What happens to the source when a move has to fall back to copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveFallback {
    /// Delete the source once the copy is complete.
    #[default]
    RemoveSource,
    /// Leave the source where it is.
    KeepSource,
}

/// Everything a run needs. Built once and handed to the pipeline by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tree whose contents are organized. Never written to in copy mode.
    pub source: PathBuf,
    /// Root of the `{year}/{month}` layout. Created at the start of a run.
    pub destination: PathBuf,
    /// Threads shared by the hashing and placement phases, at least 1.
    pub workers: usize,
    /// Copy or move placed files.
    pub mode: PlacementMode,
    /// How destination file names are built.
    pub naming: NamingPolicy,
    /// Extensions considered in both trees.
    pub extensions: ExtensionAllowList,
    /// Files smaller than this many bytes are filtered out of both passes.
    pub min_size: u64,
    /// Which copy of a repeated content is placed.
    pub representative: Representative,
    /// Where the folder date comes from.
    pub timestamps: TimestampSource,
    /// Source retention when a move has to copy instead.
    pub move_fallback: MoveFallback,
    /// Plan and log the jobs but write nothing.
    pub dry_run: bool,
}

impl Config {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            workers: default_workers(),
            mode: PlacementMode::default(),
            naming: NamingPolicy::default(),
            extensions: ExtensionAllowList::default(),
            min_size: 0,
            representative: Representative::default(),
            timestamps: TimestampSource::default(),
            move_fallback: MoveFallback::default(),
            dry_run: false,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_mode(mut self, mode: PlacementMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionAllowList) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_representative(mut self, representative: Representative) -> Self {
        self.representative = representative;
        self
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_timestamps(mut self, timestamps: TimestampSource) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn with_move_fallback(mut self, move_fallback: MoveFallback) -> Self {
        self.move_fallback = move_fallback;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One worker per logical CPU.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Parse a size string with optional suffix (KB, MB, GB) into bytes.
///
/// # Arguments
/// * `size_str` - Size string (e.g., "64KB", "1.5MB", "4096")
///
/// # Returns
/// * `Result<u64>` - Size in bytes, or an error for anything unparsable
///
/// ```
/// use picture_organizer::config::parse_size;
/// assert_eq!(parse_size("64KB").unwrap(), 65536);
/// ```
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim().to_uppercase();
    let multipliers = [
        ("KB", 1024),
        ("MB", 1024 * 1024),
        ("GB", 1024 * 1024 * 1024),
    ];

    for (suffix, multiplier) in multipliers {
        if let Some(number) = size_str.strip_suffix(suffix) {
            let value = number
                .trim()
                .parse::<f64>()
                .context("Invalid size number")?;
            return Ok((value * multiplier as f64) as u64);
        }
    }

    size_str.parse::<u64>().context("Invalid size format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_suffixes() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("1.5 MB").unwrap(), 1536 * 1024);
        assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("lots").is_err());
        assert!(parse_size("KB").is_err());
    }

    #[test]
    fn zero_workers_is_clamped() {
        let config = Config::new("/src", "/dst").with_workers(0);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn defaults_copy_and_rename() {
        let config = Config::new("/src", "/dst");
        assert_eq!(config.mode, PlacementMode::Copy);
        assert_eq!(config.naming, NamingPolicy::Rename);
        assert_eq!(config.representative, Representative::First);
        assert!(!config.dry_run);
        assert!(config.workers >= 1);
    }

    #[test]
    fn builders_set_every_option() {
        let config = Config::new("/src", "/dst")
            .with_workers(3)
            .with_mode(PlacementMode::Move)
            .with_naming(NamingPolicy::KeepName)
            .with_extensions(ExtensionAllowList::allow_all())
            .with_min_size(4096)
            .with_representative(Representative::Oldest)
            .with_timestamps(TimestampSource::Exif)
            .with_move_fallback(MoveFallback::KeepSource)
            .with_dry_run(true);

        assert_eq!(config.workers, 3);
        assert_eq!(config.mode, PlacementMode::Move);
        assert_eq!(config.naming, NamingPolicy::KeepName);
        assert!(config.extensions.allows(".anything"));
        assert_eq!(config.min_size, 4096);
        assert_eq!(config.representative, Representative::Oldest);
        assert_eq!(config.timestamps, TimestampSource::Exif);
        assert_eq!(config.move_fallback, MoveFallback::KeepSource);
        assert!(config.dry_run);
    }
}
