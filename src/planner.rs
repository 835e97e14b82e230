//! Destination layout.
//!
//! Every surviving hash becomes exactly one [`PlacementJob`] whose target is
//! `{root}/{year}/{month name}/{file name}`. The file name comes from the
//! configured [`NamingPolicy`]. Keep-name collisions are resolved against
//! both the filesystem and the names already handed out in this run.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::config::{Config, NamingPolicy, Representative};
use crate::fingerprint::{ContentHash, FileRecord};
use crate::index::DeduplicationIndex;

/// One unit of work for the placement pool. Owns everything it needs.
#[derive(Debug, Clone)]
pub struct PlacementJob {
    pub hash: ContentHash,
    pub record: FileRecord,
    pub destination_root: PathBuf,
    pub target: PathBuf,
}

pub struct Planner<'a> {
    config: &'a Config,
    reserved: HashSet<PathBuf>,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            reserved: HashSet::new(),
        }
    }

    /// Consumes the pending index, hash by hash in sorted order.
    pub fn plan(mut self, pending: DeduplicationIndex) -> Vec<PlacementJob> {
        pending
            .into_sorted_entries()
            .into_iter()
            .filter_map(|(hash, records)| self.plan_one(hash, records))
            .collect()
    }

    fn plan_one(&mut self, hash: ContentHash, records: Vec<FileRecord>) -> Option<PlacementJob> {
        let record = choose_representative(records, self.config.representative)?;
        let directory = month_directory(&self.config.destination, &record.effective_timestamp);

        let target = match self.config.naming {
            NamingPolicy::Rename => directory.join(renamed_file_name(&record, &hash)),
            NamingPolicy::KeepName => self.free_name(&directory, &record),
        };
        self.reserved.insert(target.clone());

        debug!("plan {} -> {}", record.source_path.display(), target.display());
        Some(PlacementJob {
            hash,
            record,
            destination_root: self.config.destination.clone(),
            target,
        })
    }

    /// `name.ext`, then `name_2.ext`, `name_3.ext`, ... until one is neither
    /// on disk nor already planned.
    fn free_name(&self, directory: &Path, record: &FileRecord) -> PathBuf {
        let mut attempt = 1;
        loop {
            let candidate = directory.join(kept_file_name(record, attempt));
            if !self.reserved.contains(&candidate) && !candidate.exists() {
                return candidate;
            }
            attempt += 1;
        }
    }
}

pub fn choose_representative(
    records: Vec<FileRecord>,
    policy: Representative,
) -> Option<FileRecord> {
    match policy {
        Representative::First => records.into_iter().next(),
        Representative::Oldest => records
            .into_iter()
            .min_by_key(|r| r.effective_timestamp),
        Representative::Path => records
            .into_iter()
            .min_by(|a, b| a.source_path.cmp(&b.source_path)),
    }
}

/// `{root}/2023/May`
pub fn month_directory(root: &Path, timestamp: &DateTime<Local>) -> PathBuf {
    root.join(timestamp.format("%Y").to_string())
        .join(timestamp.format("%B").to_string())
}

/// `2023-05-01 120000-<hash>.jpg`
pub fn renamed_file_name(record: &FileRecord, hash: &ContentHash) -> String {
    format!(
        "{}-{}{}",
        record.effective_timestamp.format("%Y-%m-%d %H%M%S"),
        hash,
        record.extension
    )
}

/// The original name for the first attempt, `{stem}_{n}{ext}` after that.
/// Names that are not valid UTF-8 keep their bytes.
pub fn kept_file_name(record: &FileRecord, attempt: usize) -> OsString {
    if attempt <= 1 {
        return record.full_name.clone();
    }
    let mut name = record.stem.clone();
    name.push(format!("_{attempt}"));
    name.push(record.original_extension());
    name
}
