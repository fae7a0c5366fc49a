//! Diagnostic channel.
//!
//! Failures worth a developer's attention are logged with `tracing::error!`
//! and kept in a small ring so frontends (and tests) can show what went
//! wrong. Expected conditions such as public-endpoint throttling never reach
//! this channel.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::reactive::{Observable, Watcher};

/// Default number of retained diagnostics.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 64;

/// Where a diagnostic came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSource {
    /// Per-item balance fetch
    BalanceFetch,
    /// Statistics poll
    StatsPoll,
    /// Refetch sweep
    Refetch,
}

impl DiagnosticSource {
    /// Short description used as the log message.
    pub fn context(self) -> &'static str {
        match self {
            Self::BalanceFetch => "Failed to fetch balance",
            Self::StatsPoll => "Failed to get stats",
            Self::Refetch => "Refetch failed",
        }
    }
}

/// One reported failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Origin of the failure
    pub source: DiagnosticSource,
    /// Error text
    pub detail: String,
    /// When it was reported
    pub at: DateTime<Utc>,
}

/// Session diagnostic sink.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    capacity: usize,
    recent: Observable<VecDeque<Diagnostic>>,
}

impl Diagnostics {
    /// Create a channel retaining up to `capacity` reports.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: Observable::new(VecDeque::new()),
        }
    }

    /// Log a failure and retain it.
    pub fn report(&self, source: DiagnosticSource, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::error!(?source, error = %detail, "{}", source.context());
        let diagnostic = Diagnostic {
            source,
            detail,
            at: Utc::now(),
        };
        let capacity = self.capacity;
        self.recent.update(|recent| {
            recent.push_back(diagnostic);
            while recent.len() > capacity {
                recent.pop_front();
            }
        });
    }

    /// Retained reports, oldest first.
    pub fn recent(&self) -> Vec<Diagnostic> {
        self.recent.with(|recent| recent.iter().cloned().collect())
    }

    /// Number of retained reports.
    pub fn len(&self) -> usize {
        self.recent.with(VecDeque::len)
    }

    /// Whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watch for new reports.
    pub fn watch(&self) -> Watcher<VecDeque<Diagnostic>> {
        self.recent.watch()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_retained() {
        let diagnostics = Diagnostics::default();
        diagnostics.report(DiagnosticSource::StatsPoll, "accessor threw");
        let recent = diagnostics.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].source, DiagnosticSource::StatsPoll);
        assert_eq!(recent[0].detail, "accessor threw");
    }

    #[test]
    fn test_ring_drops_oldest() {
        let diagnostics = Diagnostics::new(2);
        for detail in ["a", "b", "c"] {
            diagnostics.report(DiagnosticSource::BalanceFetch, detail);
        }
        let details: Vec<_> = diagnostics.recent().into_iter().map(|d| d.detail).collect();
        assert_eq!(details, vec!["b", "c"]);
    }
}
