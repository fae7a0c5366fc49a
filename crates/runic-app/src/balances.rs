//! Tracked wallets and their balance records.
//!
//! One record per tracked address, created up front in tracking order and
//! updated in place for the rest of the session. Records are never removed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reactive::{Observable, Watcher};

/// A wallet the dashboard follows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWallet {
    /// Base58 public key
    pub address: String,
    /// Display name
    pub name: String,
    /// One-line description
    #[serde(default)]
    pub description: String,
}

impl TrackedWallet {
    /// Create a tracked wallet.
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The default demo wallet set, in display order.
pub fn demo_wallets() -> Vec<TrackedWallet> {
    vec![
        TrackedWallet::new(
            "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB",
            "Jupiter Aggregator",
            "Jupiter Protocol main program",
        ),
        TrackedWallet::new(
            "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
            "Bonk DAO Treasury",
            "Community treasury wallet",
        ),
        TrackedWallet::new(
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "USDC Token Mint",
            "Circle USDC mint authority",
        ),
        TrackedWallet::new(
            "9n4nbM75f5Ui33ZbPYXn59EwSgE8CGsHtAeTH5YFeJ9E",
            "Binance Hot Wallet",
            "Exchange hot wallet",
        ),
    ]
}

/// Balance state of one tracked address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalanceRecord {
    /// Address this record belongs to
    pub address: String,
    /// Balance in lamports; `None` until loaded or after a failure
    pub balance: Option<u64>,
    /// Whether a fetch is in flight
    pub loading: bool,
}

impl WalletBalanceRecord {
    fn new(address: String) -> Self {
        Self {
            address,
            balance: None,
            loading: false,
        }
    }

    /// Whether a balance is known.
    pub fn is_loaded(&self) -> bool {
        self.balance.is_some()
    }
}

/// Progress of the initial bulk load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    /// Records with a known balance
    pub loaded: usize,
    /// Tracked records
    pub total: usize,
}

impl LoadProgress {
    /// Completion percentage, 0 when nothing is tracked.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.loaded as f64 / self.total as f64 * 100.0
        }
    }
}

/// Session-wide balance records keyed by address, in tracking order.
#[derive(Clone, Debug)]
pub struct BalanceBook {
    records: Observable<IndexMap<String, WalletBalanceRecord>>,
}

impl BalanceBook {
    /// Create one empty record per address. Duplicates collapse.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = addresses
            .into_iter()
            .map(|addr| {
                let addr = addr.into();
                (addr.clone(), WalletBalanceRecord::new(addr))
            })
            .collect();
        Self {
            records: Observable::new(records),
        }
    }

    fn modify(&self, address: &str, f: impl FnOnce(&mut WalletBalanceRecord)) -> bool {
        if !self.records.with(|records| records.contains_key(address)) {
            tracing::warn!(address, "balance update for untracked address ignored");
            return false;
        }
        self.records.update(|records| {
            if let Some(record) = records.get_mut(address) {
                f(record);
            }
        });
        true
    }

    /// Flag a fetch as in flight.
    pub fn mark_loading(&self, address: &str) -> bool {
        self.modify(address, |r| r.loading = true)
    }

    /// Store a fetched balance and clear the loading flag.
    pub fn set_balance(&self, address: &str, lamports: u64) -> bool {
        self.modify(address, |r| {
            r.balance = Some(lamports);
            r.loading = false;
        })
    }

    /// Forget the balance after a failed fetch and clear the loading flag.
    pub fn set_failed(&self, address: &str) -> bool {
        self.modify(address, |r| {
            r.balance = None;
            r.loading = false;
        })
    }

    /// Record for `address`.
    pub fn get(&self, address: &str) -> Option<WalletBalanceRecord> {
        self.records.with(|records| records.get(address).cloned())
    }

    /// All records in tracking order.
    pub fn records(&self) -> Vec<WalletBalanceRecord> {
        self.records.with(|records| records.values().cloned().collect())
    }

    /// Tracked addresses in order.
    pub fn addresses(&self) -> Vec<String> {
        self.records.with(|records| records.keys().cloned().collect())
    }

    /// Sum of known balances; unknown balances count as zero.
    pub fn total_lamports(&self) -> u64 {
        self.records.with(|records| {
            records
                .values()
                .filter_map(|r| r.balance)
                .fold(0u64, u64::saturating_add)
        })
    }

    /// Number of fetches in flight.
    pub fn loading_count(&self) -> usize {
        self.records
            .with(|records| records.values().filter(|r| r.loading).count())
    }

    /// Bulk-load progress.
    pub fn progress(&self) -> LoadProgress {
        self.records.with(|records| LoadProgress {
            loaded: records.values().filter(|r| r.is_loaded()).count(),
            total: records.len(),
        })
    }

    /// Watch the records for redraws.
    pub fn watch(&self) -> Watcher<IndexMap<String, WalletBalanceRecord>> {
        self.records.watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> BalanceBook {
        BalanceBook::new(demo_wallets().into_iter().map(|w| w.address))
    }

    #[test]
    fn test_one_record_per_address_in_order() {
        let book = book();
        let addresses = book.addresses();
        assert_eq!(addresses.len(), 4);
        assert_eq!(addresses[0], "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB");
        assert!(book.records().iter().all(|r| r.balance.is_none() && !r.loading));
    }

    #[test]
    fn test_loading_then_balance() {
        let book = book();
        let addr = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
        assert!(book.mark_loading(addr));
        assert_eq!(book.loading_count(), 1);

        assert!(book.set_balance(addr, 42));
        let record = book.get(addr).unwrap();
        assert_eq!(record.balance, Some(42));
        assert!(!record.loading);
        assert_eq!(book.progress(), LoadProgress { loaded: 1, total: 4 });
        assert_eq!(book.progress().percent(), 25.0);
    }

    #[test]
    fn test_failure_clears_balance() {
        let book = book();
        let addr = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        book.set_balance(addr, 7);
        book.mark_loading(addr);
        book.set_failed(addr);
        let record = book.get(addr).unwrap();
        assert_eq!(record.balance, None);
        assert!(!record.loading);
    }

    #[test]
    fn test_untracked_address_is_ignored() {
        let book = book();
        assert!(!book.set_balance("nobody", 1));
        assert_eq!(book.records().len(), 4);
    }

    #[test]
    fn test_total_counts_unknown_as_zero() {
        let book = book();
        let addrs = book.addresses();
        book.set_balance(&addrs[0], 1_000);
        book.set_balance(&addrs[2], 500);
        assert_eq!(book.total_lamports(), 1_500);
    }

    #[test]
    fn test_empty_progress() {
        let book = BalanceBook::new(Vec::<String>::new());
        assert_eq!(book.progress().percent(), 0.0);
    }
}
