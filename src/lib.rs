//! Overlap Scanner Library
//!
//! Smart money discovery: scans the traders of several tokens with bounded
//! concurrency and reports the wallets that appear across them.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod scan;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result, ScanError};
pub use fetch::TraderFetcher;
pub use scan::{ProgressEvent, ProgressSink, ScanReport, ScanRequest, ScanSession};
