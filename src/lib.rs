//! Content-addressed photo and video organizer.
//!
//! Hashes every allowed file under a source tree, drops the contents the
//! destination tree already holds, and files one copy of each remaining
//! content under `{destination}/{year}/{month}/`.
//!
//! ```no_run
//! use picture_organizer::{organize, Config, SilentReporter};
//!
//! # fn main() -> Result<(), picture_organizer::PipelineError> {
//! let config = Config::new("/media/card", "/srv/photos");
//! let summary = organize(&config, &SilentReporter)?;
//! println!("placed {} of {}", summary.placed, summary.unique_contents);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extensions;
pub mod fingerprint;
pub mod hashing;
pub mod index;
pub mod pipeline;
pub mod placer;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod walker;

pub use config::{
    Config, MoveFallback, NamingPolicy, PlacementMode, Representative, TimestampSource,
};
pub use error::{FingerprintError, PipelineError, PlacementError, PoolError};
pub use extensions::ExtensionAllowList;
pub use fingerprint::{ContentHash, FileRecord, Fingerprinter};
pub use index::DeduplicationIndex;
pub use pipeline::{organize, Organizer, Summary, TreeSummary};
pub use placer::PlacementResult;
pub use planner::{PlacementJob, Planner};
pub use progress::{BarReporter, ProgressReporter, SilentReporter};
