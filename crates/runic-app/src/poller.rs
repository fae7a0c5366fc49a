//! Periodic statistics polling.
//!
//! The first poll happens one full interval after the poller is spawned.
//! A failed or undecodable poll is reported and the previous snapshot stays
//! published; the loop keeps going until its handle is dropped.

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::SharedClient;
use crate::diagnostics::{DiagnosticSource, Diagnostics};
use crate::reactive::Observable;
use crate::stats::StatsSnapshot;

/// Polls the client's statistics accessor into an observable slot.
#[derive(Clone)]
pub struct StatsPoller {
    client: SharedClient,
    diagnostics: Diagnostics,
    latest: Observable<Option<StatsSnapshot>>,
    interval: Duration,
}

impl StatsPoller {
    /// Create a poller publishing into `latest`.
    pub fn new(
        client: SharedClient,
        diagnostics: Diagnostics,
        latest: Observable<Option<StatsSnapshot>>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            diagnostics,
            latest,
            interval,
        }
    }

    /// Take one snapshot. Returns whether it was published.
    pub fn poll_once(&self) -> bool {
        match self.client.stats().and_then(StatsSnapshot::decode) {
            Ok(snapshot) => {
                self.latest.set(Some(snapshot));
                true
            }
            Err(err) => {
                self.diagnostics
                    .report(DiagnosticSource::StatsPoll, err.to_string());
                false
            }
        }
    }

    /// Start polling on the current runtime.
    pub fn spawn(&self) -> PollerHandle {
        let poller = self.clone();
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                poller.poll_once();
            }
        });
        tracing::debug!(interval_ms = period.as_millis() as u64, "stats poller started");
        PollerHandle { handle }
    }
}

impl fmt::Debug for StatsPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsPoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollerHandle {
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling now.
    pub fn stop(self) {}

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("stats poller stopped");
    }
}
