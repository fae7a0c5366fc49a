//! Bounded activity ledger.
//!
//! A newest-first log of categorized lines. Recording prepends and then
//! truncates to the ledger's capacity, so the ledger always holds the most
//! recent `capacity` entries in reverse insertion order. Two independent
//! ledgers exist per session: the dashboard feed and the activity view.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reactive::{Observable, Watcher};

/// Entries retained by the dashboard feed.
pub const DASHBOARD_ACTIVITY_CAPACITY: usize = 50;
/// Entries retained by the dedicated activity view.
pub const ACTIVITY_VIEW_CAPACITY: usize = 100;

/// Kind of activity line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    /// Request issued or completed
    Request,
    /// Served from cache
    Cache,
    /// Retry in progress
    Retry,
    /// Failure
    Error,
}

impl ActivityCategory {
    /// Short label used by renderers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Cache => "cache",
            Self::Retry => "retry",
            Self::Error => "error",
        }
    }

    /// Indicator glyph used by renderers.
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Request => "✓",
            Self::Cache => "⛁",
            Self::Retry => "↻",
            Self::Error => "✗",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier of an activity entry, increasing within a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "act-{}", self.0)
    }
}

/// One immutable line of the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique, increasing identifier
    pub id: EntryId,
    /// Category of the line
    pub category: ActivityCategory,
    /// Display text
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    /// Relative age of the entry at `now`, for display.
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        format_relative_age(self.timestamp, now)
    }
}

/// Render the age of `timestamp` at `now` the way the feed shows it.
///
/// Under a second is "just now", under a minute counts seconds, anything
/// older counts whole minutes. Timestamps in the future read as "just now".
pub fn format_relative_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (now - timestamp).num_milliseconds();
    if diff_ms < 1_000 {
        "just now".to_string()
    } else if diff_ms < 60_000 {
        format!("{}s ago", diff_ms / 1_000)
    } else {
        format!("{}m ago", diff_ms / 60_000)
    }
}

/// Capacity-bounded, newest-first activity log.
#[derive(Debug)]
pub struct ActivityLedger {
    capacity: usize,
    next_id: AtomicU64,
    entries: Observable<VecDeque<ActivityEntry>>,
}

impl ActivityLedger {
    /// Create an empty ledger holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            entries: Observable::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new line at the front, evicting the oldest beyond capacity.
    pub fn record(&self, category: ActivityCategory, message: impl Into<String>) -> ActivityEntry {
        let message = message.into();
        let capacity = self.capacity;
        // Ids are taken under the write lock so the front always holds the
        // highest id.
        self.entries.update(|entries| {
            let entry = ActivityEntry {
                id: EntryId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                category,
                message,
                timestamp: Utc::now(),
            };
            entries.push_front(entry.clone());
            entries.truncate(capacity);
            entry
        })
    }

    /// Snapshot of the entries, newest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.with(|entries| entries.iter().cloned().collect())
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<ActivityEntry> {
        self.entries.with(|entries| entries.front().cloned())
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.with(VecDeque::len)
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watch the ledger for redraws.
    pub fn watch(&self) -> Watcher<VecDeque<ActivityEntry>> {
        self.entries.watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_record_prepends() {
        let ledger = ActivityLedger::new(3);
        ledger.record(ActivityCategory::Request, "a");
        ledger.record(ActivityCategory::Cache, "b");

        let messages: Vec<_> = ledger.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "a"]);
        assert_eq!(ledger.latest().map(|e| e.category), Some(ActivityCategory::Cache));
    }

    #[test]
    fn test_concurrent_records_stay_in_id_order() {
        let ledger = std::sync::Arc::new(ActivityLedger::new(400));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        ledger.record(ActivityCategory::Request, format!("req {i}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let ids: Vec<u64> = ledger.entries().into_iter().map(|e| e.id.0).collect();
        assert_eq!(ids.len(), 400);
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let ledger = ActivityLedger::new(2);
        for msg in ["one", "two", "three"] {
            ledger.record(ActivityCategory::Retry, msg);
        }
        let messages: Vec<_> = ledger.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["three", "two"]);
    }

    #[test]
    fn test_ids_are_increasing() {
        let ledger = ActivityLedger::new(10);
        let a = ledger.record(ActivityCategory::Request, "a");
        let b = ledger.record(ActivityCategory::Request, "b");
        assert!(b.id > a.id);
    }

    #[test]
    fn test_watch_sees_records() {
        let ledger = ActivityLedger::new(5);
        let mut watcher = ledger.watch();
        assert!(!watcher.has_changed());
        ledger.record(ActivityCategory::Error, "boom");
        assert_eq!(watcher.poll().map(|e| e.len()), Some(1));
    }

    #[test]
    fn test_relative_age_labels() {
        let now = Utc::now();
        assert_eq!(format_relative_age(now, now), "just now");
        assert_eq!(format_relative_age(now - Duration::milliseconds(999), now), "just now");
        assert_eq!(format_relative_age(now - Duration::seconds(12), now), "12s ago");
        assert_eq!(format_relative_age(now - Duration::seconds(59), now), "59s ago");
        assert_eq!(format_relative_age(now - Duration::seconds(61), now), "1m ago");
        assert_eq!(format_relative_age(now + Duration::seconds(5), now), "just now");
    }

    proptest! {
        #[test]
        fn prop_ledger_keeps_most_recent_in_reverse_order(
            capacity in 1usize..20,
            count in 0usize..60,
        ) {
            let ledger = ActivityLedger::new(capacity);
            for i in 0..count {
                ledger.record(ActivityCategory::Request, i.to_string());
            }
            let entries = ledger.entries();
            prop_assert!(entries.len() <= capacity);
            prop_assert_eq!(entries.len(), count.min(capacity));
            let expected: Vec<String> = (0..count).rev().take(capacity).map(|i| i.to_string()).collect();
            let actual: Vec<String> = entries.into_iter().map(|e| e.message).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
