//! Fixed-size fan-out/fan-in worker pool.
//!
//! Every call to [`WorkerPool::run`] is one phase: the caller submits all
//! jobs into a bounded queue, `workers` long-lived tasks drain it, and the
//! caller receives exactly one result per job before `run` returns. No job
//! is handed to more than one worker and nothing is shared between workers
//! except the two queues.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::bounded;
use log::debug;
use parking_lot::Mutex;

use crate::error::PoolError;

/// Upper bound on jobs queued ahead of the workers.
pub const JOB_QUEUE_CAPACITY: usize = 1000;

/// Jobs processed per worker thread during one phase.
pub type WorkerStats = BTreeMap<usize, usize>;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
    name: &'static str,
}

impl WorkerPool {
    pub fn new(name: &'static str, workers: usize) -> Result<Self, PoolError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{name}-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            name,
        })
    }

    /// Runs `work` over every job and feeds each result to `on_result`
    /// on the calling thread.
    ///
    /// # Arguments
    /// * `jobs` - Everything this phase has to do
    /// * `work` - Per-job function, run on the pool threads
    /// * `on_result` - Called once per result with the running count
    ///
    /// # Returns
    /// * `Result<WorkerStats, PoolError>` - Jobs handled per thread
    ///
    /// `work` must turn failures into values: the result count always
    /// equals the job count, or the phase is reported as disconnected.
    pub fn run<J, R, F, S>(
        &self,
        jobs: Vec<J>,
        work: F,
        mut on_result: S,
    ) -> Result<WorkerStats, PoolError>
    where
        J: Send + 'static,
        R: Send + 'static,
        F: Fn(J) -> R + Send + Sync + 'static,
        S: FnMut(R, usize),
    {
        let total = jobs.len();
        if total == 0 {
            return Ok(WorkerStats::new());
        }

        let stats = Arc::new(Mutex::new(WorkerStats::new()));
        let (job_tx, job_rx) = bounded::<J>(JOB_QUEUE_CAPACITY.min(total));
        let (result_tx, result_rx) = bounded::<R>(total);
        let work = Arc::new(work);

        for _ in 0..self.workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let work = Arc::clone(&work);
            let stats = Arc::clone(&stats);

            self.pool.spawn(move || {
                let thread_id = rayon::current_thread_index().unwrap_or(0);
                while let Ok(job) = job_rx.recv() {
                    let result = work(job);
                    *stats.lock().entry(thread_id).or_default() += 1;
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        debug!("{}: submitting {} jobs to {} workers", self.name, total, self.workers);
        for job in jobs {
            job_tx
                .send(job)
                .map_err(|_| PoolError::Disconnected(self.name))?;
        }
        drop(job_tx);

        for done in 1..=total {
            let result = result_rx
                .recv()
                .map_err(|_| PoolError::Disconnected(self.name))?;
            on_result(result, done);
        }

        let stats = stats.lock().clone();
        Ok(stats)
    }
}
