//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::scan::types::TimeWindow;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Scan engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Parallel fetches per scan
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Hard deadline for one token's fetch (seconds)
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Overlap records kept after ranking
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Progress events buffered before the scan waits on the consumer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub default_window: TimeWindow,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            job_timeout_secs: default_job_timeout_secs(),
            max_results: default_max_results(),
            event_buffer: default_event_buffer(),
            default_window: TimeWindow::default(),
        }
    }
}

/// Which trader fetch capability to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    /// External scraper process per token
    Command,
    /// Captured payloads from `fixture_dir`
    Fixture,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_fetcher_kind")]
    pub kind: FetcherKind,
    /// Scraper executable; token and window are appended to `args`
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub fixture_dir: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            kind: default_fetcher_kind(),
            program: default_program(),
            args: default_args(),
            fixture_dir: None,
        }
    }
}

fn default_concurrency_limit() -> usize {
    crate::scan::DEFAULT_CONCURRENCY_LIMIT
}

fn default_job_timeout_secs() -> u64 {
    crate::scan::DEFAULT_JOB_TIMEOUT.as_secs()
}

fn default_max_results() -> usize {
    crate::scan::DEFAULT_MAX_RESULTS
}

fn default_event_buffer() -> usize {
    64
}

fn default_fetcher_kind() -> FetcherKind {
    FetcherKind::Command
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["scripts/scrape_token.py".to_string()]
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("scanner.concurrency_limit", default_concurrency_limit() as i64)?
            .set_default("scanner.job_timeout_secs", default_job_timeout_secs() as i64)?
            .set_default("scanner.max_results", default_max_results() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix OVERLAP_)
            .add_source(
                config::Environment::with_prefix("OVERLAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scanner.concurrency_limit == 0 {
            anyhow::bail!("scanner.concurrency_limit must be at least 1");
        }

        if self.scanner.job_timeout_secs == 0 {
            anyhow::bail!("scanner.job_timeout_secs must be positive");
        }

        if self.scanner.max_results == 0 {
            anyhow::bail!("scanner.max_results must be at least 1");
        }

        match self.fetcher.kind {
            FetcherKind::Command => {
                if self.fetcher.program.trim().is_empty() {
                    anyhow::bail!("fetcher.program is required for the command fetcher");
                }
            }
            FetcherKind::Fixture => {
                let dir = self
                    .fetcher
                    .fixture_dir
                    .as_deref()
                    .context("fetcher.fixture_dir is required for the fixture fetcher")?;
                if !Path::new(dir).is_dir() {
                    anyhow::bail!("fetcher.fixture_dir {} is not a directory", dir);
                }
            }
        }

        // Warn about settings that hammer the data source
        if self.scanner.concurrency_limit > 8 {
            tracing::warn!(
                limit = self.scanner.concurrency_limit,
                "High scan concurrency - the data source may rate-limit or block requests"
            );
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Scanner:
    concurrency_limit: {}
    job_timeout: {}s
    max_results: {}
    event_buffer: {}
    default_window: {}
  Fetcher:
    kind: {:?}
    program: {}
    args: {:?}
    fixture_dir: {}
"#,
            self.scanner.concurrency_limit,
            self.scanner.job_timeout_secs,
            self.scanner.max_results,
            self.scanner.event_buffer,
            self.scanner.default_window,
            self.fetcher.kind,
            self.fetcher.program,
            self.fetcher
                .args
                .iter()
                .map(|a| mask_arg(a))
                .collect::<Vec<_>>(),
            self.fetcher.fixture_dir.as_deref().unwrap_or("(not set)"),
        )
    }
}

/// Mask credentials passed as `--key=value` style arguments
fn mask_arg(arg: &str) -> String {
    let lower = arg.to_lowercase();
    let secret = ["key", "token", "secret", "password"]
        .iter()
        .any(|marker| lower.contains(marker));

    match arg.find('=') {
        Some(idx) if secret => format!("{}=***", &arg[..idx]),
        _ => arg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.concurrency_limit, 3);
        assert_eq!(config.scanner.job_timeout_secs, 70);
        assert_eq!(config.scanner.max_results, 100);
        assert_eq!(config.fetcher.kind, FetcherKind::Command);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fetcher_kind_deserialize() {
        let json = r#""fixture""#;
        let kind: FetcherKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind, FetcherKind::Fixture);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlap.toml");
        std::fs::write(
            &path,
            format!(
                r#"
[scanner]
concurrency_limit = 5
default_window = "7d"

[fetcher]
kind = "fixture"
fixture_dir = "{}"
"#,
                dir.path().display()
            ),
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scanner.concurrency_limit, 5);
        assert_eq!(config.scanner.job_timeout_secs, 70);
        assert_eq!(config.scanner.default_window, TimeWindow::SevenDays);
        assert_eq!(config.fetcher.kind, FetcherKind::Fixture);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scanner.concurrency_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scanner.job_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetcher.kind = FetcherKind::Fixture;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetcher.program = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_arg() {
        assert_eq!(mask_arg("--api-key=abc123"), "--api-key=***");
        assert_eq!(mask_arg("--headless"), "--headless");
        assert_eq!(mask_arg("scripts/scrape_token.py"), "scripts/scrape_token.py");
    }
}
