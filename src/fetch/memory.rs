//! Scripted in-memory fetcher
//!
//! Each token maps to a canned response with an optional delay. Tracks the
//! order in which tokens were dispatched and the peak number of concurrent
//! fetches, which makes it the workhorse for exercising the scheduler.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::TraderFetcher;
use crate::error::ScanError;
use crate::scan::types::{TimeWindow, WalletRecord};

#[derive(Debug, Clone)]
enum Response {
    Wallets(Vec<WalletRecord>),
    Failure(String),
    Hang,
    Panic,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Duration,
    response: Response,
}

#[derive(Default)]
pub struct MemoryFetcher {
    scripts: HashMap<String, Script>,
    dispatched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `token_id` with wallets built from bare addresses
    pub fn with_addresses(self, token_id: &str, addresses: &[&str]) -> Self {
        let wallets = addresses.iter().map(|a| WalletRecord::new(*a)).collect();
        self.with_wallets(token_id, wallets)
    }

    pub fn with_wallets(self, token_id: &str, wallets: Vec<WalletRecord>) -> Self {
        self.script(token_id, Response::Wallets(wallets))
    }

    pub fn with_failure(self, token_id: &str, message: &str) -> Self {
        self.script(token_id, Response::Failure(message.to_string()))
    }

    /// Never respond for `token_id`
    pub fn with_hang(self, token_id: &str) -> Self {
        self.script(token_id, Response::Hang)
    }

    /// Panic inside the fetch for `token_id`
    pub fn with_panic(self, token_id: &str) -> Self {
        self.script(token_id, Response::Panic)
    }

    /// Delay the response for `token_id` (must follow its response setup)
    pub fn with_delay(mut self, token_id: &str, delay: Duration) -> Self {
        if let Some(script) = self.scripts.get_mut(token_id) {
            script.delay = delay;
        }
        self
    }

    fn script(mut self, token_id: &str, response: Response) -> Self {
        self.scripts.insert(
            token_id.to_string(),
            Script {
                delay: Duration::ZERO,
                response,
            },
        );
        self
    }

    /// Tokens in the order their fetches started
    pub fn dispatch_order(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Highest number of fetches that were running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge however the fetch ends (including abort)
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TraderFetcher for MemoryFetcher {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_traders(
        &self,
        token_id: &str,
        _window: TimeWindow,
    ) -> Result<Vec<WalletRecord>, ScanError> {
        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.push(token_id.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let script = self.scripts.get(token_id).cloned().ok_or_else(|| {
            ScanError::ExternalFailure(format!("no data for token {}", token_id))
        })?;

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.response {
            Response::Wallets(wallets) => Ok(wallets),
            Response::Failure(message) => Err(ScanError::ExternalFailure(message)),
            Response::Hang => std::future::pending().await,
            Response::Panic => panic!("scripted fetcher panic for {}", token_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher_scripts() {
        let fetcher = MemoryFetcher::new()
            .with_addresses("X", &["A", "B"])
            .with_failure("Y", "rate limited");

        let wallets = fetcher.fetch_traders("X", TimeWindow::OneDay).await.unwrap();
        assert_eq!(wallets.len(), 2);

        let err = fetcher.fetch_traders("Y", TimeWindow::OneDay).await.unwrap_err();
        assert_eq!(err, ScanError::ExternalFailure("rate limited".into()));

        let unknown = fetcher.fetch_traders("Z", TimeWindow::OneDay).await.unwrap_err();
        assert_eq!(unknown.to_string(), "no data for token Z");

        assert_eq!(fetcher.dispatch_order(), vec!["X", "Y", "Z"]);
        assert_eq!(fetcher.peak_in_flight(), 1);
        assert_eq!(fetcher.in_flight(), 0);
    }
}
