use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::config::{MoveFallback, PlacementMode};
use crate::error::{PlacementError, PoolError};
use crate::planner::PlacementJob;
use crate::pool::{WorkerPool, WorkerStats};

/// Outcome of one placement job.
#[derive(Debug)]
pub enum PlacementResult {
    /// The target now holds the source's content.
    Placed { source: PathBuf, target: PathBuf },
    /// Something already occupies the target. Expected on reruns, not an error.
    Skipped { target: PathBuf },
    /// Nothing was placed; any partial target has been removed.
    Failed { target: PathBuf, error: PlacementError },
}

impl PlacementResult {
    /// 1 for a placed file, 0 for anything else.
    pub fn placed(&self) -> usize {
        usize::from(matches!(self, PlacementResult::Placed { .. }))
    }
}

/// Executes placement jobs. Shared read-only by every placement worker.
#[derive(Debug, Clone)]
pub struct Placer {
    mode: PlacementMode,
    fallback: MoveFallback,
}

impl Placer {
    pub fn new(mode: PlacementMode, fallback: MoveFallback) -> Self {
        Self { mode, fallback }
    }

    pub fn place(&self, job: PlacementJob) -> PlacementResult {
        let source = job.record.source_path;
        let target = job.target;

        match self.try_place(&source, &target) {
            Ok(true) => PlacementResult::Placed { source, target },
            Ok(false) => {
                debug!("{} already exists, skipping", target.display());
                PlacementResult::Skipped { target }
            }
            Err(error) => {
                warn!("Error placing {}: {}", source.display(), error);
                PlacementResult::Failed { target, error }
            }
        }
    }

    fn try_place(&self, source: &Path, target: &Path) -> Result<bool, PlacementError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| PlacementError::DestinationUnwritable {
                path: parent.to_path_buf(),
                source: err,
            })?;
        }

        // The planner looked at the filesystem before any worker started.
        if target.exists() {
            return Ok(false);
        }

        match self.mode {
            PlacementMode::Copy => copy_exclusive(source, target),
            PlacementMode::Move => self.move_file(source, target),
        }
    }

    fn move_file(&self, source: &Path, target: &Path) -> Result<bool, PlacementError> {
        match fs::rename(source, target) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !source.exists() => {
                Err(PlacementError::SourceVanished(source.to_path_buf()))
            }
            Err(err) => {
                debug!(
                    "rename {} -> {} failed ({}), copying instead",
                    source.display(),
                    target.display(),
                    err
                );
                self.fallback_copy(source, target)
            }
        }
    }

    /// Second half of a move that could not rename: copy exclusively, then
    /// apply the configured [`MoveFallback`]. The source is only removed
    /// after this call wrote the target itself.
    fn fallback_copy(&self, source: &Path, target: &Path) -> Result<bool, PlacementError> {
        let placed = copy_exclusive(source, target)?;
        if placed && self.fallback == MoveFallback::RemoveSource {
            if let Err(err) = fs::remove_file(source) {
                warn!("Copied {} but could not remove it: {}", source.display(), err);
            }
        }
        Ok(placed)
    }
}

/// Copies `source` into a file that must not exist yet.
///
/// # Arguments
/// * `source` - File to read
/// * `target` - File to create; its directory must exist
///
/// # Returns
/// * `Ok(true)` - The target was created and fully written
/// * `Ok(false)` - Another writer got there first; nothing was touched
/// * `Err(_)` - Nothing usable was written; a partial target is removed
pub fn copy_exclusive(source: &Path, target: &Path) -> Result<bool, PlacementError> {
    let mut reader = File::open(source).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            PlacementError::SourceVanished(source.to_path_buf())
        } else {
            PlacementError::SourceUnreadable {
                path: source.to_path_buf(),
                source: err,
            }
        }
    })?;

    let mut writer = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(PlacementError::DestinationUnwritable {
                path: target.to_path_buf(),
                source: err,
            })
        }
    };

    if let Err(err) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(target) {
            warn!("Partial file {} left behind: {}", target.display(), cleanup);
        }
        return Err(PlacementError::CopyIo {
            path: target.to_path_buf(),
            source: err,
        });
    }

    Ok(true)
}

/// Runs every job through the pool. `on_result` sees each result on the
/// calling thread together with the running and total counts.
pub fn place_all<P>(
    pool: &WorkerPool,
    placer: Arc<Placer>,
    jobs: Vec<PlacementJob>,
    mut on_result: P,
) -> Result<WorkerStats, PoolError>
where
    P: FnMut(PlacementResult, usize, usize),
{
    let total = jobs.len();
    pool.run(
        jobs,
        move |job| placer.place(job),
        |result, done| on_result(result, done, total),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{ContentHash, FileRecord};
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn job(source: &Path, target: &Path) -> PlacementJob {
        let when = Local.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).single().unwrap();
        PlacementJob {
            hash: ContentHash::from("abc"),
            record: FileRecord::new(source, 0, when),
            destination_root: target.parent().unwrap().to_path_buf(),
            target: target.to_path_buf(),
        }
    }

    #[test]
    fn copy_creates_directories_and_keeps_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        fs::write(&source, b"pixels").unwrap();
        let target = dir.path().join("dst/2023/May/a.jpg");

        let placer = Placer::new(PlacementMode::Copy, MoveFallback::RemoveSource);
        let result = placer.place(job(&source, &target));

        assert_eq!(result.placed(), 1);
        assert_eq!(fs::read(&target).unwrap(), b"pixels");
        assert!(source.exists());
    }

    #[test]
    fn existing_target_is_skipped_untouched() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("taken.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&target, b"old").unwrap();

        for mode in [PlacementMode::Copy, PlacementMode::Move] {
            let placer = Placer::new(mode, MoveFallback::RemoveSource);
            let result = placer.place(job(&source, &target));
            assert!(matches!(result, PlacementResult::Skipped { .. }));
            assert_eq!(result.placed(), 0);
        }
        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert!(source.exists());
    }

    #[test]
    fn move_relocates_the_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        fs::write(&source, b"moving").unwrap();
        let target = dir.path().join("dst/2023/May/a.jpg");

        let placer = Placer::new(PlacementMode::Move, MoveFallback::RemoveSource);
        assert_eq!(placer.place(job(&source, &target)).placed(), 1);
        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"moving");
    }

    #[test]
    fn vanished_source_is_a_failure_without_a_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("gone.jpg");
        let target = dir.path().join("dst/gone.jpg");

        for mode in [PlacementMode::Copy, PlacementMode::Move] {
            let placer = Placer::new(mode, MoveFallback::RemoveSource);
            match placer.place(job(&source, &target)) {
                PlacementResult::Failed { error, .. } => {
                    assert!(matches!(error, PlacementError::SourceVanished(_)))
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(!target.exists());
        }
    }

    #[test]
    fn exclusive_copy_never_overwrites() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        fs::write(&source, b"mine").unwrap();
        fs::write(&target, b"theirs").unwrap();

        assert!(!copy_exclusive(&source, &target).unwrap());
        assert_eq!(fs::read(&target).unwrap(), b"theirs");
    }

    #[test]
    fn place_all_reports_every_job() {
        let dir = tempdir().unwrap();
        let mut jobs = Vec::new();
        for i in 0..20 {
            let source = dir.path().join(format!("src{i}.jpg"));
            fs::write(&source, format!("content {i}")).unwrap();
            jobs.push(job(&source, &dir.path().join(format!("dst/{i}.jpg"))));
        }
        let pool = WorkerPool::new("place-test", 4).unwrap();
        let placer = Arc::new(Placer::new(PlacementMode::Copy, MoveFallback::RemoveSource));

        let mut placed = 0;
        let mut last = (0, 0);
        place_all(&pool, placer, jobs, |result, done, total| {
            placed += result.placed();
            last = (done, total);
        })
        .unwrap();

        assert_eq!(placed, 20);
        assert_eq!(last, (20, 20));
        assert_eq!(fs::read(dir.path().join("dst/7.jpg")).unwrap(), b"content 7");
    }

    #[test]
    fn fallback_copy_removes_source_by_default() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        fs::write(&source, b"moving").unwrap();

        let placer = Placer::new(PlacementMode::Move, MoveFallback::RemoveSource);
        assert!(placer.fallback_copy(&source, &target).unwrap());
        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"moving");
    }

    #[test]
    fn fallback_copy_can_keep_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        fs::write(&source, b"moving").unwrap();

        let placer = Placer::new(PlacementMode::Move, MoveFallback::KeepSource);
        assert!(placer.fallback_copy(&source, &target).unwrap());
        assert_eq!(fs::read(&source).unwrap(), b"moving");
        assert_eq!(fs::read(&target).unwrap(), b"moving");
    }

    #[test]
    fn fallback_copy_that_loses_the_race_keeps_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        fs::write(&source, b"mine").unwrap();
        fs::write(&target, b"theirs").unwrap();

        let placer = Placer::new(PlacementMode::Move, MoveFallback::RemoveSource);
        assert!(!placer.fallback_copy(&source, &target).unwrap());
        assert_eq!(fs::read(&source).unwrap(), b"mine");
        assert_eq!(fs::read(&target).unwrap(), b"theirs");
    }

    #[test]
    fn fallback_copy_of_vanished_source_fails() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("gone.jpg");
        let target = dir.path().join("b.jpg");

        let placer = Placer::new(PlacementMode::Move, MoveFallback::RemoveSource);
        let err = placer.fallback_copy(&source, &target).unwrap_err();
        assert!(matches!(err, PlacementError::SourceVanished(_)));
        assert!(!target.exists());
    }
}
