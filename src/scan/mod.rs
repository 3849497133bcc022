//! Overlap scan engine
//!
//! - `executor`: one token's fetch with a hard deadline
//! - `scheduler`: bounded concurrent driver for many tokens
//! - `intersection`: ranking of wallets that traded several tokens
//! - `session`: wires the above together for one request

pub mod executor;
pub mod intersection;
pub mod money;
pub mod scheduler;
pub mod session;
pub mod types;

pub use executor::{ScanExecutor, DEFAULT_JOB_TIMEOUT};
pub use intersection::{IntersectionEngine, DEFAULT_MAX_RESULTS};
pub use scheduler::{ProgressSink, ScanScheduler, DEFAULT_CONCURRENCY_LIMIT};
pub use session::{ScanReport, ScanSession};
pub use types::{
    OverlapRecord, ProgressEvent, ScanRequest, ScanSummary, TimeWindow, TokenJob, TokenMetrics,
    TokenResult, TokenStatus, WalletRecord,
};
