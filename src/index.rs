use std::collections::HashMap;
use std::path::PathBuf;

use crate::fingerprint::{ContentHash, FileRecord};

/// Content hash to every record carrying that content, in arrival order.
///
/// The first record under a hash is the one that gets placed; the rest are
/// redundant copies that are only counted. One index is built per tree and
/// written by a single aggregator, so no locking is involved.
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    entries: HashMap<ContentHash, Vec<FileRecord>>,
    filtered: usize,
    failed: usize,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: ContentHash, record: FileRecord) {
        self.entries.entry(hash).or_default().push(record);
    }

    pub fn record_filtered(&mut self) {
        self.filtered += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Number of distinct contents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Records that made it into the index.
    pub fn indexed(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn redundant_copies(&self) -> usize {
        self.entries.values().map(|records| records.len() - 1).sum()
    }

    /// Every hash seen more than once, with the paths that share it.
    pub fn duplicate_groups(&self) -> Vec<(ContentHash, Vec<PathBuf>)> {
        let mut groups: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, records)| records.len() > 1)
            .map(|(hash, records)| {
                let paths = records.iter().map(|r| r.source_path.clone()).collect();
                (hash.clone(), paths)
            })
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }

    /// Drops every hash that also appears in `other`. Returns how many were
    /// dropped.
    pub fn subtract(&mut self, other: &DeduplicationIndex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|hash, _| !other.contains(hash));
        before - self.entries.len()
    }

    /// Entries ordered by hash, so consumers see a stable sequence for a
    /// given index.
    pub fn into_sorted_entries(self) -> Vec<(ContentHash, Vec<FileRecord>)> {
        let mut entries: Vec<_> = self.entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
