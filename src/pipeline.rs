//! Phase-ordered run.
//!
//! 1. walk + hash the source tree,
//! 2. walk + hash the destination tree,
//! 3. subtract, plan, and place.
//!
//! Each phase finishes completely before the next begins, so each index is
//! written by one phase only and read-only afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::fingerprint::{ContentHash, Fingerprinter};
use crate::hashing;
use crate::index::DeduplicationIndex;
use crate::placer::{self, PlacementResult, Placer};
use crate::planner::{PlacementJob, Planner};
use crate::pool::{WorkerPool, WorkerStats};
use crate::progress::ProgressReporter;
use crate::walker::{TreeWalker, WalkStats};

/// Counts for one hashed tree.
#[derive(Debug, Clone, Default)]
pub struct TreeSummary {
    /// Regular files the walk found.
    pub files: usize,
    /// Directories entered, the root included.
    pub directories: usize,
    /// Entries the walk could not visit.
    pub walk_errors: usize,
    /// Files hashed into the index.
    pub indexed: usize,
    /// Files skipped by the extension list or the size floor.
    pub filtered: usize,
    /// Files that could not be stat'ed or read.
    pub unreadable: usize,
    /// Distinct hashes among the indexed files.
    pub unique_contents: usize,
}

impl TreeSummary {
    fn new(walk: &WalkStats, index: &DeduplicationIndex) -> Self {
        Self {
            files: walk.files,
            directories: walk.directories,
            walk_errors: walk.errors.len(),
            indexed: index.indexed(),
            filtered: index.filtered(),
            unreadable: index.failed(),
            unique_contents: index.len(),
        }
    }
}

/// Everything a run did. Always satisfies [`Summary::is_conserved`].
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Counts for the source tree.
    pub source: TreeSummary,
    /// Counts for the destination tree, all zero when it did not exist.
    pub destination: TreeSummary,
    /// Distinct contents in the source tree.
    pub unique_contents: usize,
    /// Source records whose content appeared earlier under the same hash.
    pub redundant_copies: usize,
    /// Source contents the destination already held under any name.
    pub already_at_destination: usize,
    /// Jobs that wrote or moved a file.
    pub placed: usize,
    /// Jobs whose target existed by the time they ran.
    pub skipped: usize,
    /// Jobs that failed; nothing was left at their target.
    pub failed: usize,
    /// Jobs planned but not executed because of a dry run.
    pub would_place: usize,
    /// Source hashes held by more than one file, with their paths.
    pub duplicate_groups: Vec<(ContentHash, Vec<PathBuf>)>,
    /// Files hashed per worker thread, both trees combined.
    pub hashing_workers: WorkerStats,
    /// Jobs handled per worker thread.
    pub placement_workers: WorkerStats,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl Summary {
    /// Every unique content ends up in exactly one bucket.
    pub fn is_conserved(&self) -> bool {
        self.unique_contents
            == self.already_at_destination
                + self.placed
                + self.skipped
                + self.failed
                + self.would_place
    }
}

pub struct Organizer<'a> {
    config: &'a Config,
    reporter: &'a dyn ProgressReporter,
    pool: WorkerPool,
    fingerprinter: Arc<Fingerprinter>,
}

impl<'a> Organizer<'a> {
    pub fn new(
        config: &'a Config,
        reporter: &'a dyn ProgressReporter,
    ) -> Result<Self, PipelineError> {
        let pool = WorkerPool::new("worker", config.workers)?;
        let fingerprinter = Arc::new(Fingerprinter::new(
            config.extensions.clone(),
            config.min_size,
            config.timestamps,
        ));
        Ok(Self {
            config,
            reporter,
            pool,
            fingerprinter,
        })
    }

    pub fn run(&self) -> Result<Summary, PipelineError> {
        let start = Instant::now();
        let mut summary = Summary::default();

        if self.config.extensions.is_empty() {
            warn!("Extension list is empty; no file will be indexed");
        }

        if self.config.dry_run {
            if !self.config.destination.is_dir() {
                info!(
                    "Destination {} does not exist yet; treating it as empty",
                    self.config.destination.display()
                );
            }
        } else {
            ensure_destination_root(&self.config.destination)?;
        }

        info!("Indexing source {}", self.config.source.display());
        let (mut pending, source_walk, hashing_workers) =
            self.index_tree("source", &self.config.source)?;
        summary.source = TreeSummary::new(&source_walk, &pending);
        summary.unique_contents = pending.len();
        summary.redundant_copies = pending.redundant_copies();
        summary.duplicate_groups = pending.duplicate_groups();
        summary.hashing_workers = hashing_workers;

        let existing = if self.config.destination.is_dir() {
            info!("Indexing destination {}", self.config.destination.display());
            let (existing, destination_walk, destination_workers) =
                self.index_tree("destination", &self.config.destination)?;
            summary.destination = TreeSummary::new(&destination_walk, &existing);
            for (thread, count) in destination_workers {
                *summary.hashing_workers.entry(thread).or_default() += count;
            }
            existing
        } else {
            DeduplicationIndex::new()
        };

        summary.already_at_destination = pending.subtract(&existing);
        drop(existing);
        info!(
            "{} unique contents, {} already at destination, {} to place",
            summary.unique_contents,
            summary.already_at_destination,
            pending.len()
        );

        if pending.is_empty() {
            info!("Nothing to place");
        }
        let jobs = Planner::new(self.config).plan(pending);

        if self.config.dry_run {
            for job in &jobs {
                info!(
                    "Would place {} -> {}",
                    job.record.source_path.display(),
                    job.target.display()
                );
            }
            summary.would_place = jobs.len();
        } else {
            let workers = self.place(jobs, &mut summary)?;
            summary.placement_workers = workers;
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn index_tree(
        &self,
        label: &str,
        root: &Path,
    ) -> Result<(DeduplicationIndex, WalkStats, WorkerStats), PipelineError> {
        self.reporter.on_walk_start(label);
        let (paths, walk) = TreeWalker::new(root).collect_all();
        self.reporter
            .on_walk_complete(label, walk.files, walk.directories);

        self.reporter.on_hash_start(label, paths.len());
        let (index, workers) = hashing::build_index(
            &self.pool,
            Arc::clone(&self.fingerprinter),
            paths,
            |done, total| self.reporter.on_hash_progress(label, done, total),
        )?;
        self.reporter.on_hash_complete(label, index.len());

        Ok((index, walk, workers))
    }

    fn place(
        &self,
        jobs: Vec<PlacementJob>,
        summary: &mut Summary,
    ) -> Result<WorkerStats, PipelineError> {
        let placer = Arc::new(Placer::new(self.config.mode, self.config.move_fallback));

        self.reporter.on_place_start(jobs.len());
        let workers = placer::place_all(&self.pool, placer, jobs, |result, done, total| {
            summary.placed += result.placed();
            match result {
                PlacementResult::Placed { .. } => {}
                PlacementResult::Skipped { .. } => summary.skipped += 1,
                PlacementResult::Failed { .. } => summary.failed += 1,
            }
            self.reporter.on_place_progress(done, total);
        })?;
        self.reporter.on_place_complete(summary.placed);

        Ok(workers)
    }
}

fn ensure_destination_root(root: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(root).map_err(|source| PipelineError::DestinationRootUncreatable {
        path: root.to_path_buf(),
        source,
    })
}

/// Convenience wrapper: build an [`Organizer`] and run it once.
pub fn organize(
    config: &Config,
    reporter: &dyn ProgressReporter,
) -> Result<Summary, PipelineError> {
    Organizer::new(config, reporter)?.run()
}
