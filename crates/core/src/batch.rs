//! Chunked Batch Scheduler
//!
//! Runs an async worker over a list of items with a concurrency bound.
//! Items are split into consecutive chunks of `limit`; all workers of a chunk
//! run concurrently and the next chunk starts only after every item of the
//! current chunk has settled. A slow item therefore holds back the following
//! chunk even if other slots are free.
//!
//! Workers return their outcome as a value: a failing item must be converted
//! into an error-shaped `R` by the worker itself, so the scheduler never stops
//! on an individual failure. Output order always matches input order.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<R> {
    /// Results for every processed item, index-aligned with the input.
    /// Shorter than the input only when the run was cancelled.
    pub results: Vec<R>,
    /// Whether the run stopped at a chunk boundary because of cancellation
    pub cancelled: bool,
}

/// Scheduler executing workers in chunks of `limit`.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    limit: usize,
    cancellation_token: Option<CancellationToken>,
}

impl BatchScheduler {
    /// Create a scheduler. A limit of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancellation_token: None,
        }
    }

    /// Stop scheduling new chunks once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Run `worker` over `items`.
    ///
    /// `on_progress` receives the running count of completed items after each
    /// completion, in completion order.
    pub async fn run<T, R, F, Fut, P>(&self, items: Vec<T>, worker: F, mut on_progress: P) -> BatchOutcome<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
        P: FnMut(usize),
    {
        let total = items.len();
        let mut results: Vec<R> = Vec::with_capacity(total);
        let mut completed = 0usize;
        let mut remaining = items.into_iter();
        let mut chunk_index = 0usize;

        loop {
            let chunk: Vec<T> = remaining.by_ref().take(self.limit).collect();
            if chunk.is_empty() {
                break;
            }

            if self.is_cancelled() {
                debug!(chunk_index, completed, total, "batch cancelled before chunk start");
                return BatchOutcome {
                    results,
                    cancelled: true,
                };
            }

            debug!(chunk_index, size = chunk.len(), "batch chunk start");

            let mut slots: Vec<Option<R>> = (0..chunk.len()).map(|_| None).collect();
            let mut pending: FuturesUnordered<_> = chunk
                .into_iter()
                .enumerate()
                .map(|(slot, item)| {
                    let fut = worker(item);
                    async move { (slot, fut.await) }
                })
                .collect();

            while let Some((slot, result)) = pending.next().await {
                slots[slot] = Some(result);
                completed += 1;
                on_progress(completed);
            }

            results.extend(slots.into_iter().flatten());
            chunk_index += 1;
        }

        BatchOutcome {
            results,
            cancelled: false,
        }
    }
}

/// Run `worker` over `items` in chunks of `limit` without cancellation.
pub async fn run_batched<T, R, F, Fut, P>(items: Vec<T>, limit: usize, worker: F, on_progress: P) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
    P: FnMut(usize),
{
    BatchScheduler::new(limit)
        .run(items, worker, on_progress)
        .await
        .results
}
