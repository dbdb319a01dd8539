//! Executors for level workers

use crate::constants::RUN_LEVEL_THREAD_PREFIX;
use crate::error_ext::ErrorContext;
use locus_domain::error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs level workers
///
/// A worker may block while another thread finishes a construction it
/// depends on, so executors must not run jobs on the submitting thread.
pub trait Executor: Send + Sync {
    /// Start `job`; an error means the job was not accepted
    fn execute(&self, job: Job) -> Result<()>;
}

/// Starts one named thread per job
#[derive(Debug)]
pub struct ThreadExecutor {
    prefix: String,
    started: AtomicUsize,
}

impl ThreadExecutor {
    /// Executor naming its threads `<prefix>-<n>`
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            started: AtomicUsize::new(0),
        }
    }

    /// Number of threads started so far
    pub fn threads_started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new(RUN_LEVEL_THREAD_PREFIX)
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) -> Result<()> {
        let n = self.started.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-{n}", self.prefix))
            .spawn(job)
            .io_context("Failed to start run level worker")?;
        Ok(())
    }
}

impl Executor for rayon::ThreadPool {
    fn execute(&self, job: Job) -> Result<()> {
        self.spawn(job);
        Ok(())
    }
}

/// Rayon pool with named threads, usable as an [`Executor`]
pub fn rayon_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|n| format!("{RUN_LEVEL_THREAD_PREFIX}-pool-{n}"))
        .build()
        .config_context("Failed to build run level thread pool")
}
