//! Fixed-size worker pool that fans jobs out over nodes.
//!
//! The dispatcher pre-loads a [`WorkQueue`] with every job followed by one
//! sentinel per worker, spawns the workers, and drains their results into
//! a [`ResultSink`](crate::sink::ResultSink) while they are still running.
//! Workers share nothing but the queue and the results channel.

mod pool;
mod queue;

pub use pool::{DEFAULT_WORKERS, Dispatcher, RunSummary};
pub use queue::{QueueItem, WorkQueue};

use std::fmt;
use std::future::Future;

use crate::error::Result;
use crate::job::Job;
use crate::result::JobResult;

/// Identity of the worker running a job.
///
/// Its `Display` form (`worker-3/8`) prefixes every log line written on
/// behalf of that worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    worker: usize,
    workers: usize,
}

impl WorkerContext {
    /// `worker` is 1-based.
    pub fn new(worker: usize, workers: usize) -> Self {
        Self { worker, workers }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Size of the pool this worker belongs to.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl fmt::Display for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}/{}", self.worker, self.workers)
    }
}

/// Per-node processing function run by each worker.
///
/// An `Err` or a panic escaping `process` is caught at the worker boundary
/// and recorded as a failed [`JobResult`]; the worker keeps going.
pub trait JobProcessor: Send + Sync + 'static {
    fn process(&self, job: Job, ctx: WorkerContext) -> impl Future<Output = Result<JobResult>> + Send;
}

impl<F, Fut> JobProcessor for F
where
    F: Fn(Job, WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JobResult>> + Send,
{
    fn process(&self, job: Job, ctx: WorkerContext) -> impl Future<Output = Result<JobResult>> + Send {
        self(job, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_context_display() {
        let ctx = WorkerContext::new(3, 8);
        assert_eq!(ctx.to_string(), "worker-3/8");
        assert_eq!(ctx.worker(), 3);
        assert_eq!(ctx.workers(), 8);
    }
}
