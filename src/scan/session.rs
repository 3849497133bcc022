//! Scan session orchestration
//!
//! One session covers one request: validate, announce, schedule every
//! token, intersect the settled results and report. Per-token failures are
//! already contained by the scheduler; the only thing that aborts a session
//! here is the aggregation step itself failing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::fetch::TraderFetcher;
use crate::scan::executor::ScanExecutor;
use crate::scan::intersection::IntersectionEngine;
use crate::scan::scheduler::{ProgressSink, ScanScheduler};
use crate::scan::types::{OverlapRecord, ProgressEvent, ScanRequest, ScanSummary, TokenResult};

/// Everything a finished session produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub session_id: Uuid,
    pub token_results: Vec<TokenResult>,
    pub overlaps: Vec<OverlapRecord>,
    pub summary: ScanSummary,
}

pub struct ScanSession {
    id: Uuid,
    scheduler: ScanScheduler,
    engine: IntersectionEngine,
}

impl ScanSession {
    pub fn new(fetcher: Arc<dyn TraderFetcher>, config: &ScannerConfig) -> Self {
        let executor = ScanExecutor::new(fetcher)
            .with_deadline(Duration::from_secs(config.job_timeout_secs));

        Self {
            id: Uuid::new_v4(),
            scheduler: ScanScheduler::new(executor, config.concurrency_limit),
            engine: IntersectionEngine::new(config.max_results),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the whole scan, streaming progress into `sink`.
    ///
    /// Invalid requests are rejected before anything is emitted. Otherwise
    /// the last event is `Completed`, or `Error` if aggregation failed.
    ///
    /// Emission waits for room in the sink's channel, so the receiver has to
    /// be consumed concurrently with this call.
    pub async fn run(
        &self,
        request: ScanRequest,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let window = request.time_window;
        let jobs = request.into_jobs()?;
        let span = tracing::info_span!("scan_session", session = %self.id, tokens = jobs.len(), %window);

        async move {
            info!(
                concurrency = self.scheduler.concurrency_limit(),
                "Starting scan session"
            );
            sink.emit(ProgressEvent::started(jobs.len())).await;

            let results = self.scheduler.run(jobs, sink, cancel).await;
            self.conclude(results, sink, |results| self.engine.compute(results))
                .await
        }
        .instrument(span)
        .await
    }

    /// Aggregate settled results and emit the terminal event
    async fn conclude<F>(
        &self,
        results: Vec<TokenResult>,
        sink: &ProgressSink,
        aggregate: F,
    ) -> Result<ScanReport>
    where
        F: FnOnce(&[TokenResult]) -> Vec<OverlapRecord>,
    {
        let overlaps = match catch_unwind(AssertUnwindSafe(|| aggregate(&results))) {
            Ok(overlaps) => overlaps,
            Err(payload) => {
                let message = format!("aggregation failed: {}", panic_message(&*payload));
                error!("{}", message);
                sink.emit(ProgressEvent::error(message.clone())).await;
                return Err(Error::Session(message));
            }
        };

        let summary = ScanSummary::new(&results, overlaps.len());
        info!(
            total_tokens = summary.total_tokens,
            failed_tokens = summary.failed_tokens,
            wallets = summary.total_unique_wallets,
            overlaps = summary.intersected_wallets,
            "Scan session complete"
        );

        sink.emit(ProgressEvent::Completed {
            overlap_results: overlaps.clone(),
            summary: summary.clone(),
        })
        .await;

        Ok(ScanReport {
            session_id: self.id,
            token_results: results,
            overlaps,
            summary,
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::scan::types::TimeWindow;

    fn session() -> ScanSession {
        let fetcher = Arc::new(MemoryFetcher::new().with_addresses("X", &["A"]));
        ScanSession::new(fetcher, &ScannerConfig::default())
    }

    #[tokio::test]
    async fn test_empty_request_rejected_without_events() {
        let (sink, mut rx) = ProgressSink::channel(8);

        let outcome = session()
            .run(
                ScanRequest::new(vec![], TimeWindow::OneDay),
                &sink,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome, Err(Error::InvalidInput(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_aggregation_panic_emits_error_event() {
        let session = session();
        let (sink, mut rx) = ProgressSink::channel(8);
        let results = vec![TokenResult::success("X", vec![])];

        let outcome = session
            .conclude(results, &sink, |_| panic!("corrupt accumulator"))
            .await;

        match outcome {
            Err(Error::Session(message)) => {
                assert_eq!(message, "aggregation failed: corrupt accumulator")
            }
            other => panic!("expected session error, got {:?}", other),
        }
        match rx.try_recv() {
            Ok(ProgressEvent::Error { message, .. }) => {
                assert!(message.contains("corrupt accumulator"))
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
