//! Bounded worker pool with per-task result-or-skip semantics.
//!
//! Used for the CPU-bound image measurement step: every task runs on a
//! dedicated rayon pool, and a task that fails or panics is reported as
//! skipped while the rest of the batch completes.

use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// A task that produced no result, and why
#[derive(Debug, Clone)]
pub struct Skipped<T> {
    pub task: T,
    pub reason: String,
}

/// Results of [`WorkerPool::map_or_skip`]
#[derive(Debug)]
pub struct PoolOutcome<T, R> {
    /// Successful results, in task order
    pub results: Vec<R>,
    /// Failed or panicked tasks, in task order
    pub skipped: Vec<Skipped<T>>,
}

/// Fixed-size thread pool for independent CPU-bound tasks
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Number of workers for an optional user ceiling: detected cores minus
    /// one, at least one, clamped by the ceiling.
    pub fn worker_count(max_workers: Option<usize>) -> usize {
        let detected = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let default = detected.saturating_sub(1).max(1);
        match max_workers {
            Some(ceiling) => default.min(ceiling.max(1)),
            None => default,
        }
    }

    /// Build a pool sized by [`WorkerPool::worker_count`]
    pub fn new(max_workers: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let workers = Self::worker_count(max_workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cytoprocess-worker-{}", i))
            .build()?;
        debug!("Worker pool started with {} thread(s)", workers);
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` on every task. Errors and panics are contained to their task.
    pub fn map_or_skip<T, R, E, F>(&self, tasks: Vec<T>, f: F) -> PoolOutcome<T, R>
    where
        T: Send + Sync,
        R: Send,
        E: Display + Send,
        F: Fn(&T) -> Result<R, E> + Sync,
    {
        let outcomes: Vec<Result<R, String>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| match catch_unwind(AssertUnwindSafe(|| f(task))) {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
                })
                .collect()
        });

        let mut results = Vec::with_capacity(tasks.len());
        let mut skipped = Vec::new();
        for (task, outcome) in tasks.into_iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push(result),
                Err(reason) => skipped.push(Skipped { task, reason }),
            }
        }

        PoolOutcome { results, skipped }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
