//! Core data types for overlap scanning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result, ScanError};

/// Trading-history lookback requested for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    SevenDays,
    #[default]
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::OneDay => "1d",
            TimeWindow::ThreeDays => "3d",
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1d" => Ok(TimeWindow::OneDay),
            "3d" => Ok(TimeWindow::ThreeDays),
            "7d" => Ok(TimeWindow::SevenDays),
            "30d" => Ok(TimeWindow::ThirtyDays),
            other => Err(Error::InvalidInput(format!(
                "unknown time window '{}' (expected 1d, 3d, 7d or 30d)",
                other
            ))),
        }
    }
}

/// One token to scan. Consumed exactly once by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenJob {
    pub token_id: String,
    pub time_window: TimeWindow,
}

impl TokenJob {
    pub fn new(token_id: impl Into<String>, time_window: TimeWindow) -> Self {
        Self {
            token_id: token_id.into(),
            time_window,
        }
    }
}

/// A trader of one token with their metrics for that token.
///
/// Money and quantity values are kept as the display strings the data
/// source reports (`"$1.2K"`, `"-$340"`); a metric the source did not
/// report is empty. See [`crate::scan::money`] for numeric conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawWallet")]
pub struct WalletRecord {
    /// `None` when the source entry carried no usable address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub bought: String,
    pub sold: String,
    pub pnl: String,
    pub tokens_bought: String,
    pub tokens_sold: String,
}

impl WalletRecord {
    /// Create a record with no metrics
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            address: Some(address.trim().to_string()).filter(|a| !a.is_empty()),
            ..Self::unresolved()
        }
    }

    /// Placeholder for a source entry that could not be read
    pub fn unresolved() -> Self {
        Self {
            address: None,
            bought: String::new(),
            sold: String::new(),
            pnl: String::new(),
            tokens_bought: String::new(),
            tokens_sold: String::new(),
        }
    }

    pub fn with_metrics(
        mut self,
        bought: impl Into<String>,
        sold: impl Into<String>,
        pnl: impl Into<String>,
    ) -> Self {
        self.bought = bought.into();
        self.sold = sold.into();
        self.pnl = pnl.into();
        self
    }

    /// Resolvable address, if any
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

/// Wallet entry as emitted by fetchers: either a bare address or an object
/// with optional fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawWallet {
    Address(String),
    Entry(RawWalletEntry),
}

/// Fields are loose JSON values: scrapers emit metrics as strings or
/// numbers, and occasionally a non-string address.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawWalletEntry {
    address: Option<Value>,
    bought: Option<Value>,
    sold: Option<Value>,
    pnl: Option<Value>,
    #[serde(alias = "tokensBought")]
    tokens_bought: Option<Value>,
    #[serde(alias = "tokensSold")]
    tokens_sold: Option<Value>,
}

/// Metric as display text; absent, null and non-scalar values are empty
fn metric_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl From<RawWallet> for WalletRecord {
    fn from(raw: RawWallet) -> Self {
        let entry = match raw {
            RawWallet::Address(address) => return WalletRecord::new(address),
            RawWallet::Entry(entry) => entry,
        };

        WalletRecord {
            address: match entry.address {
                Some(Value::String(address)) => Some(address.trim().to_string()),
                _ => None,
            }
            .filter(|a| !a.is_empty()),
            bought: metric_text(entry.bought),
            sold: metric_text(entry.sold),
            pnl: metric_text(entry.pnl),
            tokens_bought: metric_text(entry.tokens_bought),
            tokens_sold: metric_text(entry.tokens_sold),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Success,
    Failure,
}

/// Settled outcome for one submitted token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub token_id: String,
    pub status: TokenStatus,
    /// Empty on failure
    pub wallets: Vec<WalletRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenResult {
    pub fn success(token_id: impl Into<String>, wallets: Vec<WalletRecord>) -> Self {
        Self {
            token_id: token_id.into(),
            status: TokenStatus::Success,
            wallets,
            error: None,
        }
    }

    pub fn failure(token_id: impl Into<String>, error: &ScanError) -> Self {
        Self {
            token_id: token_id.into(),
            status: TokenStatus::Failure,
            wallets: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TokenStatus::Success
    }
}

/// A wallet's trading metrics for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub bought: String,
    pub sold: String,
    pub pnl: String,
}

impl From<&WalletRecord> for TokenMetrics {
    fn from(wallet: &WalletRecord) -> Self {
        let or_zero = |value: &str| {
            if value.trim().is_empty() {
                "$0".to_string()
            } else {
                value.to_string()
            }
        };

        Self {
            bought: or_zero(&wallet.bought),
            sold: or_zero(&wallet.sold),
            pnl: or_zero(&wallet.pnl),
        }
    }
}

/// A wallet found trading several of the scanned tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapRecord {
    pub address: String,
    pub match_count: usize,
    /// Tokens the wallet traded, in discovery order
    pub token_ids: Vec<String>,
    pub per_token_metrics: BTreeMap<String, TokenMetrics>,
    /// Sum of per-token pnl, formatted like the source values
    pub total_pnl: String,
}

/// Totals reported with the final event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total_tokens: usize,
    /// Wallets seen across all tokens (summed per token, not deduplicated)
    pub total_unique_wallets: usize,
    pub intersected_wallets: usize,
    pub failed_tokens: usize,
    pub timestamp: DateTime<Utc>,
}

impl ScanSummary {
    pub fn new(results: &[TokenResult], intersected_wallets: usize) -> Self {
        Self {
            total_tokens: results.len(),
            total_unique_wallets: results.iter().map(|r| r.wallets.len()).sum(),
            intersected_wallets,
            failed_tokens: results.iter().filter(|r| !r.is_success()).count(),
            timestamp: Utc::now(),
        }
    }
}

/// Notification stream for one scan session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename = "started")]
    Started {
        message: String,
        total_tokens: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "token_complete")]
    TokenCompleted {
        token_id: String,
        completed_count: usize,
        total_count: usize,
        wallet_count: usize,
    },

    #[serde(rename = "token_error")]
    TokenFailed {
        token_id: String,
        error: String,
        completed_count: usize,
        total_count: usize,
    },

    #[serde(rename = "complete")]
    Completed {
        overlap_results: Vec<OverlapRecord>,
        summary: ScanSummary,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn started(total_tokens: usize) -> Self {
        ProgressEvent::Started {
            message: format!(
                "Starting scan of {} tokens with parallel processing",
                total_tokens
            ),
            total_tokens,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Token this event reports on, for per-token events
    pub fn token_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::TokenCompleted { token_id, .. }
            | ProgressEvent::TokenFailed { token_id, .. } => Some(token_id),
            _ => None,
        }
    }

    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Error { .. }
        )
    }

    /// Render as a server-push frame (`data: <json>\n\n`)
    pub fn to_sse_frame(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// An incoming scan request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanRequest {
    pub tokens: Vec<String>,
    #[serde(default, rename = "timeWindow", alias = "timePeriod")]
    pub time_window: TimeWindow,
}

impl ScanRequest {
    pub fn new(tokens: Vec<String>, time_window: TimeWindow) -> Self {
        Self {
            tokens,
            time_window,
        }
    }

    /// Parse a JSON request body; any shape problem is `InvalidInput`
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Validate and turn into scan jobs, one per token
    pub fn into_jobs(self) -> Result<Vec<TokenJob>> {
        if self.tokens.is_empty() {
            return Err(Error::InvalidInput(
                "tokens must be a non-empty list".to_string(),
            ));
        }

        let window = self.time_window;
        self.tokens
            .into_iter()
            .enumerate()
            .map(|(idx, token)| {
                let token = token.trim();
                if token.is_empty() {
                    Err(Error::InvalidInput(format!("token at position {} is blank", idx)))
                } else {
                    Ok(TokenJob::new(token, window))
                }
            })
            .collect()
    }
}
