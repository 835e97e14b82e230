use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single file never made it into an index.
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot stat {path}: {reason}")]
    StatFailed { path: PathBuf, reason: String },
}

/// Why a single placement job did not produce a file.
#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("source {0} vanished before it could be placed")]
    SourceVanished(PathBuf),

    #[error("cannot open source {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy to {path} failed: {source}")]
    CopyIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),

    #[error("all {0} workers exited before their results were collected")]
    Disconnected(&'static str),
}

/// Run-level failures. Everything per-file is absorbed into counts instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("destination root {path} could not be created: {source}")]
    DestinationRootUncreatable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("extension allow-list {path}: {source}")]
    AllowList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
