//! Joinable work queue with per-item acknowledgement.
//!
//! Every item taken with [`WorkQueue::get`] must be acknowledged with
//! [`WorkQueue::task_done`]; [`WorkQueue::join`] resolves once every item
//! ever put has been acknowledged. Sentinels count as items.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::warn;
use tokio::sync::Notify;

/// An entry in the work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    /// A unit of work.
    Job(T),
    /// No more work: the worker that takes this must exit.
    Sentinel,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<QueueItem<T>>,
    unfinished: usize,
}

/// Multi-consumer FIFO queue shared by the dispatcher and its workers.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
    drained: Notify,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, item: QueueItem<T>) {
        {
            let mut state = self.lock();
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.available.notify_one();
    }

    /// Add a job.
    pub fn put(&self, job: T) {
        self.push(QueueItem::Job(job));
    }

    /// Add a "no more work" marker.
    pub fn put_sentinel(&self) {
        self.push(QueueItem::Sentinel);
    }

    /// Take the next item without waiting.
    pub fn try_get(&self) -> Option<QueueItem<T>> {
        self.lock().items.pop_front()
    }

    /// Take the next item, waiting until one is available.
    pub async fn get(&self) -> QueueItem<T> {
        loop {
            let notified = self.available.notified();
            if let Some(item) = self.try_get() {
                return item;
            }
            notified.await;
        }
    }

    /// Acknowledge one item taken from the queue.
    pub fn task_done(&self) {
        let remaining = {
            let mut state = self.lock();
            if state.unfinished == 0 {
                warn!("task_done() called more times than items were queued");
                return;
            }
            state.unfinished -= 1;
            state.unfinished
        };
        if remaining == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every queued item has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting to be taken.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items put but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}
