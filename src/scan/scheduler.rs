//! Bounded concurrent scan scheduler
//!
//! A single coordinating task owns the FIFO queue, the in-flight set and the
//! results accumulator. Executors only report back through their futures, so
//! every mutation of shared scan state happens in one place.
//!
//! Loop: fill free slots from the queue, wait for the next settlement,
//! record it and emit its progress event, repeat until the queue is empty
//! and nothing is in flight.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::scan::executor::ScanExecutor;
use crate::scan::types::{ProgressEvent, TokenJob, TokenResult, WalletRecord};

/// Parallel fetches per scan
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;

/// Caller-supplied destination for progress events (single consumer)
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver its events arrive on.
    ///
    /// The channel is bounded: once `capacity` events are waiting, the scan
    /// pauses until the receiver takes one. Drain it from a separate task
    /// (or size it for every event of the scan) rather than only after the
    /// scan returns.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Deliver an event. A consumer that went away does not stop the scan.
    pub async fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Progress receiver dropped, event discarded");
        }
    }
}

pub struct ScanScheduler {
    executor: Arc<ScanExecutor>,
    concurrency_limit: usize,
}

impl ScanScheduler {
    pub fn new(executor: ScanExecutor, concurrency_limit: usize) -> Self {
        Self {
            executor: Arc::new(executor),
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Run every job and return one result per job, in submission order.
    ///
    /// When `cancel` fires, in-flight fetches are torn down and every job
    /// that has not settled yet settles as cancelled. Only jobs that were
    /// dispatched get a progress event for that; jobs still queued are
    /// recorded as cancelled without one, so `completed_count` may stop
    /// short of `total_count` on a cancelled scan.
    ///
    /// Events are sent on a bounded channel and each send waits for room, so
    /// the receiver must be drained while this runs.
    pub async fn run(
        &self,
        jobs: Vec<TokenJob>,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<TokenResult> {
        let total = jobs.len();
        let token_ids: Vec<String> = jobs.iter().map(|j| j.token_id.clone()).collect();
        let mut queue: VecDeque<(usize, TokenJob)> = jobs.into_iter().enumerate().collect();
        let mut results: Vec<Option<TokenResult>> = (0..total).map(|_| None).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut completed = 0;

        loop {
            if !cancel.is_cancelled() {
                while in_flight.len() < self.concurrency_limit {
                    let Some((index, job)) = queue.pop_front() else {
                        break;
                    };
                    debug!(
                        token = %job.token_id,
                        in_flight = in_flight.len() + 1,
                        queued = queue.len(),
                        "Dispatching scan"
                    );
                    let executor = Arc::clone(&self.executor);
                    in_flight.push(async move {
                        let outcome = executor.run(&job).await;
                        (index, job, outcome)
                    });
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                settled = in_flight.next() => settled,
            };
            let Some((index, job, outcome)) = settled else {
                break;
            };

            completed += 1;
            let (result, event) = settle(job.token_id, outcome, completed, total);
            results[index] = Some(result);
            sink.emit(event).await;
        }

        // Only reachable with unsettled jobs after cancellation
        drop(in_flight);
        if results.iter().any(Option::is_none) {
            warn!(
                settled = completed,
                total, "Scan cancelled, abandoning unsettled tokens"
            );
        }
        // Never dispatched: recorded, not reported
        for (index, job) in queue {
            debug!(token = %job.token_id, "Cancelled before dispatch");
            results[index] = Some(TokenResult::failure(job.token_id, &ScanError::Cancelled));
        }
        for (index, slot) in results.iter_mut().enumerate() {
            if slot.is_none() {
                completed += 1;
                let (result, event) = settle(
                    token_ids[index].clone(),
                    Err(ScanError::Cancelled),
                    completed,
                    total,
                );
                *slot = Some(result);
                sink.emit(event).await;
            }
        }

        results.into_iter().flatten().collect()
    }
}

/// Turn an executor outcome into the token's result and progress event
fn settle(
    token_id: String,
    outcome: Result<Vec<WalletRecord>, ScanError>,
    completed: usize,
    total: usize,
) -> (TokenResult, ProgressEvent) {
    match outcome {
        Ok(wallets) => {
            info!(token = %token_id, wallets = wallets.len(), completed, total, "Token scan complete");
            let event = ProgressEvent::TokenCompleted {
                token_id: token_id.clone(),
                completed_count: completed,
                total_count: total,
                wallet_count: wallets.len(),
            };
            (TokenResult::success(token_id, wallets), event)
        }
        Err(error) => {
            warn!(token = %token_id, %error, completed, total, "Token scan failed");
            let event = ProgressEvent::TokenFailed {
                token_id: token_id.clone(),
                error: error.to_string(),
                completed_count: completed,
                total_count: total,
            };
            (TokenResult::failure(token_id, &error), event)
        }
    }
}
