use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::queue::{QueueItem, WorkQueue};
use super::{JobProcessor, WorkerContext};
use crate::error::{DispatchError, Result};
use crate::job::Job;
use crate::result::JobResult;
use crate::sink::ResultSink;

/// Worker count used by [`Dispatcher::default`].
pub const DEFAULT_WORKERS: usize = 40;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs submitted.
    pub jobs: usize,
    /// Workers actually started.
    pub workers: usize,
    /// Results handed to the sink.
    pub written: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether every submitted job produced a persisted result.
    pub fn is_complete(&self) -> bool {
        self.written == self.jobs
    }
}

/// Runs jobs on a fixed-size pool of tokio tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workers: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// Configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Workers started for `jobs` jobs: never more than there is work for.
    pub fn effective_workers(&self, jobs: usize) -> usize {
        self.workers.min(jobs)
    }

    /// Run every job, writing each result to `sink` as it arrives.
    ///
    /// Returns once one result per job has been persisted and every queue
    /// item has been acknowledged. A sink error aborts the outstanding
    /// workers and is returned.
    pub async fn run<P, S>(&self, jobs: Vec<Job>, processor: P, sink: &mut S) -> Result<RunSummary>
    where
        P: JobProcessor,
        S: ResultSink + ?Sized,
    {
        if self.workers == 0 {
            return Err(DispatchError::InvalidConfig {
                message: "worker count must be at least 1".to_string(),
            }
            .into());
        }

        let started = Instant::now();
        let expected = jobs.len();
        let workers = self.effective_workers(expected);
        if expected == 0 {
            info!("No jobs to run");
            return Ok(RunSummary {
                jobs: 0,
                workers: 0,
                written: 0,
                elapsed: started.elapsed(),
            });
        }

        info!("Running {} jobs on {} workers", expected, workers);
        let queue = Arc::new(WorkQueue::new());
        for job in jobs {
            queue.put(job);
        }

        let processor = Arc::new(processor);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(workers);
        for worker in 1..=workers {
            info!("Creating worker {} of {}", worker, workers);
            queue.put_sentinel();
            let ctx = WorkerContext::new(worker, workers);
            handles.push(tokio::spawn(worker_loop(
                ctx,
                queue.clone(),
                tx.clone(),
                processor.clone(),
            )));
        }
        drop(tx);

        let mut written = 0;
        while written < expected {
            debug!("Retrieving result {} of {}", written + 1, expected);
            let Some(result) = rx.recv().await else {
                error!("All workers exited after {} of {} results", written, expected);
                return Err(DispatchError::ResultsClosed {
                    expected,
                    received: written,
                }
                .into());
            };

            if let Err(e) = sink.write(&result) {
                error!("Writing the result for {} failed: {}", result.node, e);
                for handle in &handles {
                    handle.abort();
                }
                return Err(e.into());
            }
            written += 1;
            info!("Collected result {} of {} ({})", written, expected, result.node);
        }
        info!("Finished collecting results");

        queue.join().await;
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                return Err(DispatchError::WorkerFailed {
                    worker: index + 1,
                    message: e.to_string(),
                }
                .into());
            }
        }
        info!("All workers finished");

        Ok(RunSummary {
            jobs: expected,
            workers,
            written,
            elapsed: started.elapsed(),
        })
    }
}

async fn worker_loop<P: JobProcessor>(
    ctx: WorkerContext,
    queue: Arc<WorkQueue<Job>>,
    results: mpsc::UnboundedSender<JobResult>,
    processor: Arc<P>,
) {
    loop {
        let job = match queue.get().await {
            QueueItem::Sentinel => {
                info!("{}: no more jobs in the queue", ctx);
                queue.task_done();
                break;
            }
            QueueItem::Job(job) => job,
        };

        let node = job.node().clone();
        info!("{}: processing {}; {} item(s) left in the queue", ctx, node, queue.len());

        let result = match AssertUnwindSafe(processor.process(job, ctx)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("{}: processing {} failed: {}", ctx, node, e);
                JobResult::failed(&node, format!("processing failed: {}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("{}: processing {} panicked: {}", ctx, node, message);
                JobResult::failed(&node, format!("processing panicked: {}", message))
            }
        };
        queue.task_done();

        if results.send(result).is_err() {
            warn!("{}: results channel closed, stopping", ctx);
            break;
        }
    }
    debug!("{}: exiting", ctx);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SessionError, SinkError};
    use crate::job::{NodeDescriptor, SessionSpec};
    use crate::result::ErrorKind;
    use crate::session::{SessionConfig, SessionProcessor};
    use crate::transport::Credentials;
    use crate::transport::mock::{Script, ScriptedConnector};
    use std::collections::HashSet;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn jobs(n: usize) -> Vec<Job> {
        Job::for_nodes(
            (1..=n).map(|i| NodeDescriptor::new(format!("SIU{}", i), format!("10.0.0.{}", i))),
            &[],
        )
    }

    async fn echo(job: Job, _ctx: WorkerContext) -> Result<JobResult> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(JobResult::new(job.node()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_result_per_job_for_every_pool_size() {
        let n = 6;
        for workers in 1..=n {
            let mut sink: Vec<JobResult> = Vec::new();
            let summary = assert_ok!(Dispatcher::new(workers).run(jobs(n), echo, &mut sink).await);

            assert_eq!(summary.jobs, n);
            assert_eq!(summary.workers, workers);
            assert!(summary.is_complete());
            assert_eq!(sink.len(), n);
            let names: HashSet<&str> = sink.iter().map(|r| r.node.as_str()).collect();
            assert_eq!(names.len(), n, "duplicate or missing result with {} workers", workers);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_never_exceeds_job_count() {
        let mut sink: Vec<JobResult> = Vec::new();
        let summary = assert_ok!(Dispatcher::default().run(jobs(3), echo, &mut sink).await);
        assert_eq!(summary.workers, 3);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let mut sink: Vec<JobResult> = Vec::new();
        let err = assert_err!(Dispatcher::new(0).run(jobs(2), echo, &mut sink).await);
        assert!(matches!(err, Error::Dispatch(DispatchError::InvalidConfig { .. })));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_no_jobs() {
        let mut sink: Vec<JobResult> = Vec::new();
        let summary = assert_ok!(Dispatcher::new(4).run(Vec::new(), echo, &mut sink).await);
        assert_eq!(summary.workers, 0);
        assert!(summary.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_panics_become_failed_results() {
        async fn flaky(job: Job, _ctx: WorkerContext) -> Result<JobResult> {
            match job.node().name() {
                "SIU2" => Err(SessionError::Closed.into()),
                "SIU3" => panic!("boom on {}", job.node().address()),
                _ => Ok(JobResult::new(job.node())),
            }
        }

        let mut sink: Vec<JobResult> = Vec::new();
        let summary = assert_ok!(Dispatcher::new(1).run(jobs(4), flaky, &mut sink).await);
        assert_eq!(summary.written, 4);

        let by_name = |name: &str| sink.iter().find(|r| r.node == name).unwrap();
        assert!(by_name("SIU1").error.is_none());
        assert!(by_name("SIU4").error.is_none());

        let failed = by_name("SIU2").error.as_ref().unwrap();
        assert_eq!(failed.kind, ErrorKind::Worker);
        assert!(failed.message.contains("Session already closed"));

        let panicked = by_name("SIU3").error.as_ref().unwrap();
        assert_eq!(panicked.kind, ErrorKind::Worker);
        assert!(panicked.message.contains("boom on 10.0.0.3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_pool_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(Mutex::new(Vec::new()));

        let processor = {
            let (active, peak, started) = (active.clone(), peak.clone(), started.clone());
            move |job: Job, ctx: WorkerContext| {
                let (active, peak, started) = (active.clone(), peak.clone(), started.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    started
                        .lock()
                        .unwrap()
                        .push((job.node().name().to_string(), Instant::now(), ctx.worker()));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Error>(JobResult::new(job.node()))
                }
            }
        };

        let begin = Instant::now();
        let mut sink: Vec<JobResult> = Vec::new();
        assert_ok!(Dispatcher::new(2).run(jobs(3), processor, &mut sink).await);

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let started = started.lock().unwrap();
        assert_eq!(started.len(), 3);
        assert!(started[0].1 - begin < Duration::from_millis(100));
        assert!(started[1].1 - begin < Duration::from_millis(100));
        assert!(started[2].1 - begin >= Duration::from_secs(1));
    }

    struct FailingSink {
        accepted: usize,
    }

    impl ResultSink for FailingSink {
        fn write(&mut self, _: &JobResult) -> std::result::Result<(), SinkError> {
            if self.accepted == 1 {
                return Err(SinkError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            self.accepted += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_fatal() {
        let mut sink = FailingSink { accepted: 0 };
        let err = assert_err!(Dispatcher::new(2).run(jobs(5), echo, &mut sink).await);
        assert!(matches!(err, Error::Sink(SinkError::Io(_))));
        assert_eq!(sink.accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_nodes_two_workers_end_to_end() {
        let node = Script::default()
            .reply("uptime", b"uptime\r\n 10:00 up 3 days\r\nOperationSucceeded\r\nOSmon> ")
            .reply("gettime", b"gettime\r\n2026-10-16 10:00\r\nOSmon> ");
        let connector = ScriptedConnector::new(node);
        let log = connector.log.clone();
        let processor = SessionProcessor::new(connector).with_config(
            SessionConfig::default().settle(Duration::from_millis(10)),
        );

        let session = SessionSpec::new("s1", Credentials::password("admin", "secret"))
            .with_commands(["uptime", "gettime"]);
        let jobs = Job::for_nodes(
            (1..=3).map(|i| NodeDescriptor::new(format!("SIU{}", i), format!("10.0.0.{}", i))),
            &[session],
        );

        let mut sink: Vec<JobResult> = Vec::new();
        let summary = assert_ok!(Dispatcher::new(2).run(jobs, processor, &mut sink).await);

        assert_eq!(summary.workers, 2);
        assert!(summary.is_complete());
        assert_eq!(sink.len(), 3);
        for result in &sink {
            assert!(result.error.is_none());
            assert_eq!(result.sessions.len(), 1);

            let batch = &result.sessions[0].commands[2..];
            assert_eq!(batch.len(), 2);
            assert!(batch[0].is_success());
            assert!(batch[1].is_ambiguous());
        }
        assert_eq!(log.with(|c| c.connects.len()), 3);
        assert_eq!(log.with(|c| c.closes), 3);
    }
}
