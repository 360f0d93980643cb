//! Worker pool dispatch.
//!
//! One dedicated rayon pool per phase, constructed explicitly and released
//! when the handle goes out of scope. The global rayon pool is never touched.

use crate::common::errors::{ErrorLog, PipelineError};
use anyhow::{Context, Result};
use log::info;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::path::Path;

/// Anything the pool can process; the source path identifies the item in
/// logs and in the persistent error log.
pub trait WorkUnit: Send + Sync {
    fn source(&self) -> &Path;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub completed: usize,
    pub failed: usize,
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("faceharvest-worker-{}", i))
            .build()
            .context("failed to build worker thread pool")?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Dispatch one task per chunk and block until every chunk completes.
    ///
    /// Items inside a chunk run strictly sequentially on the worker that owns
    /// the chunk. A recoverable item error is recorded against the item and
    /// the worker moves on; a fatal error stops that chunk and propagates out
    /// of the phase once all chunks have returned.
    pub fn run_phase<T, F>(
        &self,
        chunks: Vec<Vec<T>>,
        errors: &ErrorLog,
        process: F,
    ) -> Result<PhaseReport, PipelineError>
    where
        T: WorkUnit,
        F: Fn(&T) -> Result<(), PipelineError> + Send + Sync,
    {
        let results: Vec<Result<PhaseReport, PipelineError>> = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| {
                    let mut report = PhaseReport::default();
                    for item in chunk {
                        match process(item) {
                            Ok(()) => report.completed += 1,
                            Err(err) if err.is_fatal() => return Err(err),
                            Err(err) => {
                                errors.record(item.source(), &err);
                                report.failed += 1;
                            }
                        }
                    }
                    Ok(report)
                })
                .collect()
        });

        let mut total = PhaseReport::default();
        for result in results {
            let chunk_report = result?;
            total.completed += chunk_report.completed;
            total.failed += chunk_report.failed;
        }
        if total.failed > 0 {
            info!(
                "{} of {} items failed; see {:?} for details",
                total.failed,
                total.completed + total.failed,
                errors.path()
            );
        }
        Ok(total)
    }
}
