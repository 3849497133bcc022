//! External scraper process fetcher
//!
//! Runs `<program> <args...> <token> <window>` and reads a JSON array of
//! wallets from stdout. The child is spawned with `kill_on_drop`, so when the
//! executor abandons the fetch (deadline, cancellation) the process dies with
//! it.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{parse_wallet_payload, TraderFetcher};
use crate::error::ScanError;
use crate::scan::types::{TimeWindow, WalletRecord};

/// Longest stderr excerpt carried into an error message
const MAX_STDERR_CHARS: usize = 512;

pub struct CommandFetcher {
    program: String,
    args: Vec<String>,
}

impl CommandFetcher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn build_command(&self, token_id: &str, window: TimeWindow) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(token_id)
            .arg(window.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TraderFetcher for CommandFetcher {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn fetch_traders(
        &self,
        token_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<WalletRecord>, ScanError> {
        debug!(program = %self.program, token = %token_id, window = %window, "Spawning fetcher");

        let output = self
            .build_command(token_id, window)
            .output()
            .await
            .map_err(|e| {
                ScanError::ExternalFailure(format!("failed to spawn {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = tail(&String::from_utf8_lossy(&output.stderr), MAX_STDERR_CHARS);
            let detail = match output.status.code() {
                Some(code) => format!("fetcher exited with code {}: {}", code, stderr),
                None => format!("fetcher terminated by signal: {}", stderr),
            };
            return Err(ScanError::ExternalFailure(detail));
        }

        parse_wallet_payload(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last `max` chars of `text`, trimmed
fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}
