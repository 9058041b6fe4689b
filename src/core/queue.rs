// Bounded-concurrency task queue.
//
// Results always come back in submission order. A failing task fails the
// whole run, but siblings that are already running are not cancelled: each
// task is a spawned runtime task, so dropping its handle detaches it.

use crate::utils::{Result, RnaError};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::debug;

/// Concurrency used when the caller has no preference
pub const DEFAULT_CONCURRENCY: usize = 1;

type BoxedTask<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

pub struct TaskQueue<T> {
    pending: Vec<BoxedTask<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Number of tasks waiting for the next run
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Appends a task. Nothing runs until [`TaskQueue::run`].
    pub fn enqueue<F, Fut>(&mut self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.pending
            .push(Box::new(move || -> BoxFuture<'static, Result<T>> { Box::pin(task()) }));
    }

    /// Runs every pending task with at most `concurrency` of them in flight
    /// and returns their results in submission order.
    ///
    /// The pending list is drained up front, so tasks enqueued while this run
    /// is in progress belong to the next run and never share its result slots.
    ///
    /// On the first failure the run returns `TaskFailure` and starts nothing
    /// else; tasks already in flight keep running in the background.
    pub async fn run(&mut self, concurrency: usize) -> Result<Vec<T>> {
        if concurrency == 0 {
            return Err(RnaError::config(
                "task queue concurrency must be at least 1".to_string(),
            ));
        }

        let tasks = std::mem::take(&mut self.pending);
        let total = tasks.len();
        debug!("Running {} queued tasks, concurrency {}", total, concurrency);

        let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut waiting = tasks.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < concurrency {
                let Some((index, task)) = waiting.next() else {
                    break;
                };
                let handle = tokio::spawn(task());
                in_flight.push(async move { (index, handle.await) });
            }

            let Some((index, joined)) = in_flight.next().await else {
                break;
            };

            match joined {
                Ok(Ok(value)) => results[index] = Some(value),
                Ok(Err(err)) => {
                    debug!(
                        "Task #{} failed, {} still in flight are left running",
                        index,
                        in_flight.len()
                    );
                    return Err(RnaError::task_failure(index, err));
                }
                Err(_) => return Err(RnaError::TaskPanicked { index }),
            }
        }

        // Every slot was written exactly once by the loop above.
        results
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| RnaError::config("task queue lost a result slot".to_string()))
    }
}
