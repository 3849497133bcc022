//! Fetcher backed by captured payloads on disk
//!
//! Looks for `<dir>/<token>_<window>.json` first, then `<dir>/<token>.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{parse_wallet_payload, TraderFetcher};
use crate::error::ScanError;
use crate::scan::types::{TimeWindow, WalletRecord};

pub struct FixtureFetcher {
    dir: PathBuf,
}

impl FixtureFetcher {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn candidates(&self, token_id: &str, window: TimeWindow) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{}_{}.json", token_id, window)),
            self.dir.join(format!("{}.json", token_id)),
        ]
    }
}

#[async_trait]
impl TraderFetcher for FixtureFetcher {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_traders(
        &self,
        token_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<WalletRecord>, ScanError> {
        if token_id.contains(['/', '\\']) || token_id.contains("..") {
            return Err(ScanError::ExternalFailure(format!(
                "invalid token identifier: {}",
                token_id
            )));
        }

        for path in self.candidates(token_id, window) {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => return parse_wallet_payload(&raw),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ScanError::ExternalFailure(format!(
                        "failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(ScanError::ExternalFailure(format!(
            "no fixture for token {}",
            token_id
        )))
    }
}
