//! Trader fetch capability
//!
//! The scan engine only knows "given a token and a time window, produce
//! wallet records or fail". Adapters:
//! - [`CommandFetcher`]: runs an external scraper process per token
//! - [`FixtureFetcher`]: reads captured payloads from disk
//! - [`MemoryFetcher`]: scripted in-memory responses

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::config::{FetcherConfig, FetcherKind};
use crate::error::{Error, Result, ScanError};
use crate::scan::types::{TimeWindow, WalletRecord};

pub mod command;
pub mod fixture;
pub mod memory;

pub use command::CommandFetcher;
pub use fixture::FixtureFetcher;
pub use memory::MemoryFetcher;

/// Source of a token's trader list
#[async_trait]
pub trait TraderFetcher: Send + Sync {
    /// Fetcher name for logging
    fn name(&self) -> &'static str;

    /// Fetch the wallets that traded `token_id` within `window`.
    ///
    /// Latency is unbounded as far as callers are concerned; the scan
    /// executor enforces its own deadline.
    async fn fetch_traders(
        &self,
        token_id: &str,
        window: TimeWindow,
    ) -> std::result::Result<Vec<WalletRecord>, ScanError>;
}

/// Parse a fetcher payload: a JSON array of wallet entries.
///
/// Only a payload that is not an array fails the token. An entry that cannot
/// be read is kept as an unresolved wallet (no address) and logged, so the
/// rest of the token's wallets still count.
pub fn parse_wallet_payload(raw: &str) -> std::result::Result<Vec<WalletRecord>, ScanError> {
    let entries: Vec<Value> = serde_json::from_str(raw.trim())
        .map_err(|e| ScanError::ExternalFailure(format!("failed to parse output: {}", e)))?;

    Ok(entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            WalletRecord::deserialize(entry).unwrap_or_else(|e| {
                warn!(index, %entry, error = %e, "Unreadable wallet entry");
                WalletRecord::unresolved()
            })
        })
        .collect())
}

/// Build the fetcher selected in configuration
pub fn from_config(config: &FetcherConfig) -> Result<Arc<dyn TraderFetcher>> {
    match config.kind {
        FetcherKind::Command => Ok(Arc::new(CommandFetcher::new(
            config.program.clone(),
            config.args.clone(),
        ))),
        FetcherKind::Fixture => {
            let dir = config.fixture_dir.as_ref().ok_or_else(|| {
                Error::Config("fetcher.fixture_dir is required for the fixture fetcher".into())
            })?;
            Ok(Arc::new(FixtureFetcher::new(dir)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wallet_payload() {
        let wallets = parse_wallet_payload("  [\"A\", {\"address\": \"B\", \"pnl\": \"$5\"}]\n").unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[1].pnl, "$5");

        let err = parse_wallet_payload("Traceback (most recent call last):").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse output"));

        // Object instead of array
        assert!(parse_wallet_payload(r#"{"address": "A"}"#).is_err());
    }

    #[test]
    fn test_unreadable_entries_do_not_fail_the_payload() {
        let wallets = parse_wallet_payload(r#"[null, "A", "B"]"#).unwrap();
        assert_eq!(wallets.len(), 3);
        assert_eq!(wallets[0], WalletRecord::unresolved());
        assert_eq!(wallets[1].address(), Some("A"));
        assert_eq!(wallets[2].address(), Some("B"));

        let wallets = parse_wallet_payload(r#"[{"address": 42}, "A", "B"]"#).unwrap();
        let addresses: Vec<_> = wallets.iter().map(|w| w.address()).collect();
        assert_eq!(addresses, vec![None, Some("A"), Some("B")]);

        let wallets = parse_wallet_payload(r#"[{"address": "A", "pnl": 5}, "B", 7, []]"#).unwrap();
        assert_eq!(wallets.len(), 4);
        assert_eq!(wallets[0].pnl, "5");
        assert_eq!(wallets[1].address(), Some("B"));
        assert_eq!(wallets[2].address(), None);
        assert_eq!(wallets[3].address(), None);
    }

    #[test]
    fn test_from_config_fixture_requires_dir() {
        let config = FetcherConfig {
            kind: FetcherKind::Fixture,
            fixture_dir: None,
            ..FetcherConfig::default()
        };
        assert!(matches!(from_config(&config), Err(Error::Config(_))));

        let config = FetcherConfig {
            kind: FetcherKind::Fixture,
            fixture_dir: Some("fixtures".into()),
            ..FetcherConfig::default()
        };
        assert_eq!(from_config(&config).unwrap().name(), "fixture");
    }
}
