//! Task scheduler - priority queue, worker pool and completion barrier
//!
//! The [`TaskQueue`] holds every task of a sync run from enqueue to
//! completion. Workers spawned by [`spawn_workers`] repeatedly take the most
//! urgent task, run it through a [`TaskHandler`] and mark it done. Tasks may
//! enqueue further tasks while they run, so the full amount of work is never
//! known up front.
//!
//! ## Completion
//!
//! ```text
//! enqueue ──→ outstanding += 1 ──→ pending ──→ take ──→ handle ──→ done
//!                                                                   │
//!                                           outstanding -= 1 ◄──────┘
//!                                                  │
//!                                      == 0 → wait_for_completion() returns
//! ```
//!
//! `outstanding` counts tasks that are pending or running. Children are
//! enqueued from inside the parent's body, i.e. before the parent's `done`,
//! so the counter can only reach zero once the whole tree of work is
//! finished.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

// ============================================================================
// Scheduled / QueueError
// ============================================================================

/// An item the [`TaskQueue`] can order
///
/// Lower priority numbers run first; the `Display` output is used in logs.
pub trait Scheduled: fmt::Display + Send + 'static {
    fn priority(&self) -> u32;
}

/// Errors returned by [`TaskQueue::take`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was shut down while waiting for a task
    #[error("task queue interrupted")]
    Interrupted,
}

// ============================================================================
// TaskQueue
// ============================================================================

struct QueueState<T> {
    /// Pending tasks keyed by (priority, enqueue sequence)
    pending: BTreeMap<(u32, u64), T>,
    next_seq: u64,
    /// Tasks pending or running
    outstanding: usize,
}

/// Unbounded priority queue with a completion barrier
///
/// The internal lock is a `std::sync::Mutex` that is never held across an
/// `.await`.
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
    completed: Notify,
    shutdown: CancellationToken,
}

impl<T: Scheduled> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: BTreeMap::new(),
                next_seq: 0,
                outstanding: 0,
            }),
            available: Notify::new(),
            completed: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task and wakes one idle worker
    ///
    /// Never blocks and never fails. The task counts as outstanding from this
    /// point on.
    pub fn enqueue(&self, task: T) {
        let priority = task.priority();
        let outstanding = {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            trace!(task = %task, priority, seq, "Enqueued task");
            state.pending.insert((priority, seq), task);
            state.outstanding += 1;
            state.outstanding
        };
        trace!(outstanding, "Queue grew");
        self.available.notify_one();
    }

    fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        let task = state.pending.pop_first().map(|(_, task)| task);
        if task.is_some() && !state.pending.is_empty() {
            self.available.notify_one();
        }
        task
    }

    /// Waits for the most urgent pending task
    ///
    /// Returns the lowest priority number first, FIFO among equal priorities.
    ///
    /// # Errors
    /// [`QueueError::Interrupted`] once [`shutdown`](Self::shutdown) was called
    pub async fn take(&self) -> Result<T, QueueError> {
        loop {
            if self.shutdown.is_cancelled() {
                return Err(QueueError::Interrupted);
            }

            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.pop() {
                return Ok(task);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.shutdown.cancelled() => return Err(QueueError::Interrupted),
            }
        }
    }

    /// Marks one taken task as finished
    ///
    /// Must be called exactly once per task returned by [`take`](Self::take),
    /// after its body returned and after any tasks it produced were enqueued.
    pub fn done(&self) {
        let remaining = {
            let mut state = self.lock();
            debug_assert!(state.outstanding > 0, "done() called more often than take()");
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding
        };
        trace!(remaining, "Task done");
        if remaining == 0 {
            self.completed.notify_waiters();
        }
    }

    /// Waits until no task is pending or running
    pub async fn wait_for_completion(&self) {
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Tasks pending or running
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Tasks waiting to be taken
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Releases every worker blocked in [`take`](Self::take)
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<T: Scheduled> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Worker pool
// ============================================================================

/// Executes tasks taken from a [`TaskQueue`]
#[async_trait::async_trait]
pub trait TaskHandler<T: Scheduled>: Send + Sync + 'static {
    /// Runs one task; follow-up work is enqueued on `queue`
    async fn handle(&self, task: T, queue: &Arc<TaskQueue<T>>) -> anyhow::Result<()>;

    /// Called after a task returned an error
    fn on_failure(&self, _description: &str, _error: &anyhow::Error) {}

    /// Called after a task panicked
    fn on_panic(&self, _description: &str) {}
}

/// Calls [`TaskQueue::done`] when dropped, including during unwinding
struct DoneGuard<'a, T: Scheduled>(&'a TaskQueue<T>);

impl<T: Scheduled> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        self.0.done();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn worker_loop<T, H>(worker: usize, queue: Arc<TaskQueue<T>>, handler: Arc<H>)
where
    T: Scheduled,
    H: TaskHandler<T>,
{
    debug!(worker, "Worker started");

    loop {
        let task = match queue.take().await {
            Ok(task) => task,
            Err(QueueError::Interrupted) => break,
        };

        let _done = DoneGuard(&queue);
        let description = task.to_string();
        trace!(worker, task = %description, "Running task");

        let outcome = AssertUnwindSafe(handler.handle(task, &queue))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => trace!(worker, task = %description, "Task finished"),
            Ok(Err(e)) => {
                error!(worker, task = %description, error = %format!("{e:#}"), "Task failed");
                handler.on_failure(&description, &e);
            }
            Err(payload) => {
                error!(
                    worker,
                    task = %description,
                    panic = %panic_message(payload.as_ref()),
                    "Task panicked"
                );
                handler.on_panic(&description);
            }
        }
    }

    debug!(worker, "Worker stopped");
}

/// Spawns `count` workers that serve `queue` until it is shut down
pub fn spawn_workers<T, H>(
    queue: Arc<TaskQueue<T>>,
    handler: Arc<H>,
    count: usize,
) -> Vec<JoinHandle<()>>
where
    T: Scheduled,
    H: TaskHandler<T>,
{
    (0..count.max(1))
        .map(|worker| tokio::spawn(worker_loop(worker, queue.clone(), handler.clone())))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
