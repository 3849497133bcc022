//! Single-token scan with a hard deadline
//!
//! The fetch runs in its own task so a panic inside the capability turns
//! into an error for that token only. The task handle aborts on drop: when
//! the deadline fires (or the caller drops the scan) the fetch future is
//! torn down, which also kills any process it spawned.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::fetch::TraderFetcher;
use crate::scan::types::{TokenJob, WalletRecord};

/// Deadline per token, measured from dispatch
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(70);

pub struct ScanExecutor {
    fetcher: Arc<dyn TraderFetcher>,
    deadline: Duration,
}

impl ScanExecutor {
    pub fn new(fetcher: Arc<dyn TraderFetcher>) -> Self {
        Self {
            fetcher,
            deadline: DEFAULT_JOB_TIMEOUT,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Fetch one token's traders. Always resolves to a `Result`.
    pub async fn run(&self, job: &TokenJob) -> Result<Vec<WalletRecord>, ScanError> {
        let start = Instant::now();
        let fetcher = Arc::clone(&self.fetcher);
        let token_id = job.token_id.clone();
        let window = job.time_window;

        let task = AbortOnDropHandle::new(tokio::spawn(async move {
            fetcher.fetch_traders(&token_id, window).await
        }));

        match tokio::time::timeout(self.deadline, task).await {
            Ok(Ok(outcome)) => {
                debug!(
                    token = %job.token_id,
                    fetcher = self.fetcher.name(),
                    latency_ms = %start.elapsed().as_millis(),
                    ok = outcome.is_ok(),
                    "Fetch settled"
                );
                outcome
            }
            Ok(Err(join_error)) => {
                let detail = if join_error.is_panic() {
                    "fetcher panicked"
                } else {
                    "fetch task aborted"
                };
                warn!(token = %job.token_id, "{}", detail);
                Err(ScanError::ExternalFailure(detail.to_string()))
            }
            Err(_) => {
                warn!(
                    token = %job.token_id,
                    deadline_secs = self.deadline.as_secs(),
                    "Fetch exceeded deadline, terminating"
                );
                Err(ScanError::Timeout(self.deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::scan::types::TimeWindow;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    fn job(token: &str) -> TokenJob {
        TokenJob::new(token, TimeWindow::SevenDays)
    }

    #[tokio::test]
    async fn test_executor_success() {
        let fetcher = Arc::new(MemoryFetcher::new().with_addresses("X", &["A", "B"]));
        let executor = ScanExecutor::new(fetcher);

        let wallets = executor.run(&job("X")).await.unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(executor.deadline(), DEFAULT_JOB_TIMEOUT);
    }

    #[tokio::test]
    async fn test_executor_external_failure() {
        let fetcher = Arc::new(MemoryFetcher::new().with_failure("X", "bad payload"));
        let executor = ScanExecutor::new(fetcher);

        assert_eq!(
            executor.run(&job("X")).await,
            Err(ScanError::ExternalFailure("bad payload".into()))
        );
    }

    #[tokio::test]
    async fn test_executor_contains_panic() {
        let fetcher = Arc::new(MemoryFetcher::new().with_panic("X"));
        let executor = ScanExecutor::new(fetcher);

        assert_eq!(
            executor.run(&job("X")).await,
            Err(ScanError::ExternalFailure("fetcher panicked".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_timeout() {
        let fetcher = Arc::new(MemoryFetcher::new().with_hang("X"));
        let executor =
            ScanExecutor::new(fetcher.clone()).with_deadline(Duration::from_secs(70));

        let started = tokio::time::Instant::now();
        let outcome = executor.run(&job("X")).await;

        assert_eq!(outcome, Err(ScanError::Timeout(Duration::from_secs(70))));
        assert!(started.elapsed() >= Duration::from_secs(70));
    }

    /// Signals when its fetch future is dropped
    struct DropProbe {
        dropped: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    }

    struct Notify(Option<oneshot::Sender<()>>);

    impl Drop for Notify {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[async_trait]
    impl TraderFetcher for DropProbe {
        fn name(&self) -> &'static str {
            "probe"
        }

        async fn fetch_traders(
            &self,
            _token_id: &str,
            _window: TimeWindow,
        ) -> Result<Vec<WalletRecord>, ScanError> {
            let _notify = Notify(self.dropped.lock().unwrap().take());
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_terminates_fetch_on_timeout() {
        let (tx, rx) = oneshot::channel();
        let probe = Arc::new(DropProbe {
            dropped: std::sync::Mutex::new(Some(tx)),
        });
        let executor = ScanExecutor::new(probe).with_deadline(Duration::from_secs(5));

        assert!(executor.run(&job("X")).await.unwrap_err().is_timeout());

        // The abandoned fetch is torn down rather than left running
        assert!(rx.await.is_ok());
    }
}
