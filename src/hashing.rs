use std::path::PathBuf;
use std::sync::Arc;

use log::{trace, warn};

use crate::error::{FingerprintError, PoolError};
use crate::fingerprint::{ContentHash, FileRecord, Fingerprinter};
use crate::index::DeduplicationIndex;
use crate::pool::{WorkerPool, WorkerStats};

/// What one hashing worker reports for one path. Every submitted path
/// produces exactly one of these.
#[derive(Debug)]
pub enum HashOutcome {
    Hashed(ContentHash, FileRecord),
    Filtered(PathBuf),
    Failed(PathBuf, FingerprintError),
}

impl HashOutcome {
    fn from_path(fingerprinter: &Fingerprinter, path: PathBuf) -> Self {
        match fingerprinter.fingerprint(&path) {
            Ok(Some((hash, record))) => HashOutcome::Hashed(hash, record),
            Ok(None) => HashOutcome::Filtered(path),
            Err(err) => HashOutcome::Failed(path, err),
        }
    }
}

/// Hashes `paths` on the pool and folds every outcome into a fresh index.
/// Returns only once all paths are accounted for.
pub fn build_index<P>(
    pool: &WorkerPool,
    fingerprinter: Arc<Fingerprinter>,
    paths: Vec<PathBuf>,
    mut progress: P,
) -> Result<(DeduplicationIndex, WorkerStats), PoolError>
where
    P: FnMut(usize, usize),
{
    let total = paths.len();
    let mut index = DeduplicationIndex::new();

    let stats = pool.run(
        paths,
        move |path| HashOutcome::from_path(&fingerprinter, path),
        |outcome, done| {
            match outcome {
                HashOutcome::Hashed(hash, record) => {
                    trace!("{} {}", hash, record.source_path.display());
                    index.insert(hash, record);
                }
                HashOutcome::Filtered(path) => {
                    trace!("filtered {}", path.display());
                    index.record_filtered();
                }
                HashOutcome::Failed(_, err) => {
                    warn!("{}", err);
                    index.record_failed();
                }
            }
            progress(done, total);
        },
    )?;

    Ok((index, stats))
}
