//! Balance fetch routines.
//!
//! `fetch_balance` is the per-wallet routine; `fetch_all` walks the tracked
//! list sequentially with a pause after each wallet so public endpoints are
//! not hammered. Neither can fail as a whole: every per-wallet failure ends
//! as an error line in the activity feed and a cleared balance.

use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};

use crate::activity::ActivityCategory;
use crate::balances::BalanceBook;
use crate::client::SharedClient;
use crate::diagnostics::{DiagnosticSource, Diagnostics};
use crate::errors::FailureKind;
use crate::feed::ActivityFeed;
use crate::format::{address_prefix, sol_fixed, validate_address};

/// RPC method used to read a balance.
pub const GET_BALANCE_METHOD: &str = "getBalance";

/// Activity line recorded when a public endpoint throttles us.
pub const RATE_LIMITED_MESSAGE: &str =
    "Rate limited - please configure API keys for better reliability";

/// Lamports carried by a `getBalance` response.
///
/// Accepts `{ "value": n, .. }` or a bare number; anything else reads as 0.
pub fn extract_lamports(response: &Value) -> u64 {
    let number = match response {
        Value::Object(map) => map.get("value").filter(|v| v.is_number()),
        Value::Number(_) => Some(response),
        _ => None,
    };
    number.map_or(0, |n| {
        n.as_u64()
            .unwrap_or_else(|| n.as_f64().map_or(0, |f| f as u64))
    })
}

/// Result of one per-wallet fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Balance stored
    Updated(u64),
    /// Balance cleared
    Failed(FailureKind),
}

/// Tally of a sequential sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Wallets whose balance was stored
    pub updated: usize,
    /// Wallets throttled by the endpoint
    pub rate_limited: usize,
    /// Wallets that failed for any other reason
    pub failed: usize,
}

impl SweepReport {
    fn tally(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Updated(_) => self.updated += 1,
            FetchOutcome::Failed(FailureKind::RateLimited) => self.rate_limited += 1,
            FetchOutcome::Failed(FailureKind::Request) => self.failed += 1,
        }
    }

    /// Wallets visited.
    pub fn total(&self) -> usize {
        self.updated + self.rate_limited + self.failed
    }
}

/// Fetches balances into the session's book and feed.
#[derive(Clone)]
pub struct BalanceFetcher {
    client: SharedClient,
    book: BalanceBook,
    feed: ActivityFeed,
    diagnostics: Diagnostics,
    pacing: Duration,
}

impl BalanceFetcher {
    /// Create a fetcher pausing `pacing` after each wallet of a sweep.
    pub fn new(
        client: SharedClient,
        book: BalanceBook,
        feed: ActivityFeed,
        diagnostics: Diagnostics,
        pacing: Duration,
    ) -> Self {
        Self {
            client,
            book,
            feed,
            diagnostics,
            pacing,
        }
    }

    /// Fetch one balance.
    pub async fn fetch_balance(&self, address: &str) -> FetchOutcome {
        self.book.mark_loading(address);
        let prefix = address_prefix(address);

        if !validate_address(address) {
            self.book.set_failed(address);
            self.diagnostics.report(
                DiagnosticSource::BalanceFetch,
                format!("invalid public key: {address}"),
            );
            self.feed.record(
                ActivityCategory::Error,
                format!("Failed to fetch balance for {prefix}"),
            );
            return FetchOutcome::Failed(FailureKind::Request);
        }

        self.feed.record(
            ActivityCategory::Request,
            format!("Fetching balance for {prefix}..."),
        );

        match self
            .client
            .request(GET_BALANCE_METHOD, vec![json!(address)])
            .await
        {
            Ok(response) => {
                let lamports = extract_lamports(&response);
                self.book.set_balance(address, lamports);
                self.feed.record(
                    ActivityCategory::Request,
                    format!("Balance updated: {} SOL", sol_fixed(lamports)),
                );
                FetchOutcome::Updated(lamports)
            }
            Err(err) => {
                let kind = FailureKind::classify(&err);
                self.book.set_failed(address);
                let message = match kind {
                    FailureKind::RateLimited => {
                        tracing::debug!(address, "balance fetch rate limited");
                        RATE_LIMITED_MESSAGE.to_string()
                    }
                    FailureKind::Request => {
                        self.diagnostics
                            .report(DiagnosticSource::BalanceFetch, err.to_string());
                        format!("Failed to fetch balance for {prefix}")
                    }
                };
                self.feed.record(ActivityCategory::Error, message);
                FetchOutcome::Failed(kind)
            }
        }
    }

    /// Fetch every tracked balance in order, pausing after each.
    pub async fn fetch_all(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for address in self.book.addresses() {
            report.tally(self.fetch_balance(&address).await);
            tokio::time::sleep(self.pacing).await;
        }
        tracing::debug!(?report, "balance sweep finished");
        report
    }

    /// The book this fetcher writes to.
    pub fn book(&self) -> &BalanceBook {
        &self.book
    }
}

impl fmt::Debug for BalanceFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalanceFetcher")
            .field("book", &self.book)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_object() {
        assert_eq!(
            extract_lamports(&json!({"context": {"slot": 1}, "value": 1_500_000_000u64})),
            1_500_000_000
        );
    }

    #[test]
    fn test_extract_from_bare_number() {
        assert_eq!(extract_lamports(&json!(42)), 42);
        assert_eq!(extract_lamports(&json!(12.9)), 12);
    }

    #[test]
    fn test_extract_fallbacks_to_zero() {
        assert_eq!(extract_lamports(&json!({"value": "7"})), 0);
        assert_eq!(extract_lamports(&json!({"lamports": 7})), 0);
        assert_eq!(extract_lamports(&json!("7")), 0);
        assert_eq!(extract_lamports(&Value::Null), 0);
        assert_eq!(extract_lamports(&json!(-5)), 0);
    }

    #[test]
    fn test_sweep_report_tally() {
        let mut report = SweepReport::default();
        report.tally(FetchOutcome::Updated(1));
        report.tally(FetchOutcome::Failed(FailureKind::RateLimited));
        report.tally(FetchOutcome::Failed(FailureKind::Request));
        report.tally(FetchOutcome::Updated(2));
        assert_eq!(
            report,
            SweepReport {
                updated: 2,
                rate_limited: 1,
                failed: 1
            }
        );
        assert_eq!(report.total(), 4);
    }
}
