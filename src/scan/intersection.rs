//! Cross-token wallet intersection
//!
//! Pure and synchronous: a wallet's tokens and per-token metrics are
//! gathered from successful results, filtered by the match threshold,
//! ranked by match count and capped.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::scan::money::{format_money, sum_money};
use crate::scan::types::{OverlapRecord, TokenMetrics, TokenResult};

/// Result cap, applied after ranking
pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Debug, Clone)]
pub struct IntersectionEngine {
    max_results: usize,
}

/// Everything seen for one address
struct Sighting {
    address: String,
    token_ids: Vec<String>,
    metrics: BTreeMap<String, TokenMetrics>,
}

impl Sighting {
    fn into_record(self) -> OverlapRecord {
        let total_pnl = format_money(sum_money(self.metrics.values().map(|m| m.pnl.as_str())));
        OverlapRecord {
            address: self.address,
            match_count: self.token_ids.len(),
            token_ids: self.token_ids,
            per_token_metrics: self.metrics,
            total_pnl,
        }
    }
}

impl IntersectionEngine {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Minimum distinct tokens a wallet needs to be reported.
    ///
    /// A single submitted token lists all of its wallets.
    fn min_matches(submitted: usize) -> usize {
        if submitted > 1 {
            2
        } else {
            1
        }
    }

    /// Rank wallets that traded several of the scanned tokens.
    ///
    /// `results` holds one entry per submitted token; failed tokens count
    /// towards the threshold but contribute no wallets.
    pub fn compute(&self, results: &[TokenResult]) -> Vec<OverlapRecord> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sightings: Vec<Sighting> = Vec::new();
        let mut skipped = 0usize;

        for result in results.iter().filter(|r| r.is_success()) {
            for wallet in &result.wallets {
                let Some(address) = wallet.address() else {
                    warn!(token = %result.token_id, ?wallet, "Skipping wallet without address");
                    skipped += 1;
                    continue;
                };

                let slot = *index.entry(address.to_string()).or_insert_with(|| {
                    sightings.push(Sighting {
                        address: address.to_string(),
                        token_ids: Vec::new(),
                        metrics: BTreeMap::new(),
                    });
                    sightings.len() - 1
                });
                let sighting = &mut sightings[slot];

                if !sighting.token_ids.contains(&result.token_id) {
                    sighting.token_ids.push(result.token_id.clone());
                }
                // Last occurrence of a wallet/token pair wins
                sighting
                    .metrics
                    .insert(result.token_id.clone(), TokenMetrics::from(wallet));
            }
        }

        let min_matches = Self::min_matches(results.len());
        let unique = sightings.len();

        let mut records: Vec<OverlapRecord> = sightings
            .into_iter()
            .filter(|s| s.token_ids.len() >= min_matches)
            .map(Sighting::into_record)
            .collect();

        // Stable: equal counts keep discovery order
        records.sort_by(|a, b| b.match_count.cmp(&a.match_count));
        records.truncate(self.max_results);

        debug!(
            tokens = results.len(),
            unique_wallets = unique,
            skipped,
            min_matches,
            overlaps = records.len(),
            "Intersection computed"
        );

        records
    }
}

impl Default for IntersectionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::scan::types::WalletRecord;

    fn token(id: &str, addresses: &[&str]) -> TokenResult {
        TokenResult::success(id, addresses.iter().map(|a| WalletRecord::new(*a)).collect())
    }

    fn addresses(records: &[OverlapRecord]) -> Vec<&str> {
        records.iter().map(|r| r.address.as_str()).collect()
    }

    #[test]
    fn test_single_token_lists_everything() {
        let records = IntersectionEngine::default().compute(&[token("X", &["A", "B"])]);

        assert_eq!(addresses(&records), vec!["A", "B"]);
        assert!(records.iter().all(|r| r.match_count == 1));
        assert_eq!(records[0].token_ids, vec!["X"]);
    }

    #[test]
    fn test_multi_token_intersection() {
        let records = IntersectionEngine::default()
            .compute(&[token("X", &["A", "B"]), token("Y", &["B", "C"])]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "B");
        assert_eq!(records[0].match_count, 2);
        assert_eq!(records[0].token_ids, vec!["X", "Y"]);
        assert_eq!(
            records[0].per_token_metrics.keys().collect::<Vec<_>>(),
            vec!["X", "Y"]
        );
    }

    #[test]
    fn test_failed_tokens_count_towards_threshold() {
        let records = IntersectionEngine::default().compute(&[
            token("X", &["A", "B"]),
            TokenResult::failure("Y", &ScanError::Timeout(std::time::Duration::from_secs(70))),
        ]);

        // Two tokens were submitted, so lone wallets of X are not overlaps
        assert!(records.is_empty());
    }

    #[test]
    fn test_all_failed_is_empty() {
        let failed = |id: &str| TokenResult::failure(id, &ScanError::Cancelled);
        let records = IntersectionEngine::default().compute(&[failed("X"), failed("Y")]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_ranking_and_tie_order() {
        let records = IntersectionEngine::default().compute(&[
            token("X", &["A", "B", "C"]),
            token("Y", &["A", "B", "C"]),
            token("Z", &["C"]),
        ]);

        assert_eq!(addresses(&records), vec!["C", "A", "B"]);
        assert_eq!(records[0].match_count, 3);
    }

    #[test]
    fn test_ranking_cap_applied_after_sort() {
        // Wallet i appears in 2 + (i % 3) of four tokens: 50 each of 2, 3, 4
        let tokens = ["T0", "T1", "T2", "T3"];
        let mut per_token: Vec<Vec<String>> = vec![Vec::new(); tokens.len()];
        for i in 0..150 {
            for list in per_token.iter_mut().take(2 + i % 3) {
                list.push(format!("wallet-{:03}", i));
            }
        }
        let results: Vec<TokenResult> = tokens
            .iter()
            .zip(per_token)
            .map(|(id, list)| {
                TokenResult::success(*id, list.into_iter().map(WalletRecord::new).collect())
            })
            .collect();

        let records = IntersectionEngine::default().compute(&results);

        assert_eq!(records.len(), 100);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].match_count >= pair[1].match_count));
        assert_eq!(records.iter().filter(|r| r.match_count == 4).count(), 50);
        assert_eq!(records.iter().filter(|r| r.match_count == 3).count(), 50);
        assert!(records.iter().all(|r| r.match_count >= 3));
    }

    #[test]
    fn test_malformed_wallets_skipped() {
        let nameless = serde_json::from_str::<WalletRecord>(r#"{"bought": "$5"}"#).unwrap();
        let mut x = token("X", &["A"]);
        x.wallets.insert(0, nameless.clone());
        let mut y = token("Y", &["A", "B"]);
        y.wallets.push(nameless);

        let records = IntersectionEngine::default().compute(&[x, y]);

        assert_eq!(addresses(&records), vec!["A"]);
        assert_eq!(records[0].match_count, 2);
    }

    #[test]
    fn test_duplicate_wallet_last_write_wins() {
        let x = TokenResult::success(
            "X",
            vec![
                WalletRecord::new("A").with_metrics("$1", "$1", "$0"),
                WalletRecord::new("A").with_metrics("$2K", "$3K", "$1K"),
            ],
        );
        let y = TokenResult::success(
            "Y",
            vec![WalletRecord::new("A").with_metrics("$100", "$50", "-$50")],
        );

        let records = IntersectionEngine::default().compute(&[x, y]);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.match_count, 2);
        assert_eq!(record.token_ids, vec!["X", "Y"]);
        assert_eq!(record.per_token_metrics["X"].bought, "$2K");
        assert_eq!(record.per_token_metrics["Y"].pnl, "-$50");
        assert_eq!(record.total_pnl, "$950");
    }

    #[test]
    fn test_compute_is_idempotent() {
        let engine = IntersectionEngine::default();
        let results = vec![
            token("X", &["A", "B", "D"]),
            token("Y", &["B", "C", "D"]),
            token("Z", &["D", "A"]),
        ];

        assert_eq!(engine.compute(&results), engine.compute(&results));
    }

    #[test]
    fn test_custom_cap() {
        let records = IntersectionEngine::new(1).compute(&[token("X", &["A", "B"])]);
        assert_eq!(addresses(&records), vec!["A"]);
    }
}
