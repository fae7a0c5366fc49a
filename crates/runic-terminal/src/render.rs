//! Line-oriented rendering of session state.
//!
//! The renderer holds watchers on the session observables and turns every
//! change since the last call into printable lines. Nothing is redrawn when
//! nothing changed.

use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use runic_app::format::{format_count, format_sol, format_sol_total, shorten_address};
use runic_app::{
    ActivityEntry, AppCore, AppPhase, Diagnostic, EntryId, Notification, NotificationId,
    StatsSnapshot, Watcher,
};

/// Incremental renderer for one session.
pub struct Renderer {
    core: AppCore,
    phase: Watcher<AppPhase>,
    activity: Watcher<VecDeque<ActivityEntry>>,
    toasts: Watcher<Vec<Notification>>,
    stats: Watcher<Option<StatsSnapshot>>,
    diagnostics: Watcher<VecDeque<Diagnostic>>,
    last_entry: Option<EntryId>,
    seen_toasts: HashSet<NotificationId>,
    last_diagnostic: Option<Diagnostic>,
}

impl Renderer {
    /// Watch `core` from its current state onwards.
    pub fn new(core: &AppCore) -> Self {
        Self {
            core: core.clone(),
            phase: core.watch_phase(),
            activity: core.activity().watch(),
            toasts: core.notifications().watch(),
            stats: core.watch_stats(),
            diagnostics: core.diagnostics().watch(),
            last_entry: None,
            seen_toasts: HashSet::new(),
            last_diagnostic: None,
        }
    }

    /// Lines for everything that changed since the previous call.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(phase) = self.phase.poll() {
            lines.push(format!("== {phase} =="));
        }
        if self.core.phase() == AppPhase::Loading {
            let progress = self.core.balances().progress();
            lines.push(format!(
                "   loading {}/{} ({:.0}%)",
                progress.loaded,
                progress.total,
                progress.percent()
            ));
        }

        if let Some(entries) = self.activity.poll() {
            lines.extend(self.new_entries(&entries));
        }
        if let Some(toasts) = self.toasts.poll() {
            lines.extend(self.new_toasts(&toasts));
        }
        if let Some(recent) = self.diagnostics.poll() {
            lines.extend(self.new_diagnostics(&recent));
        }
        if let Some(Some(snapshot)) = self.stats.poll() {
            lines.push(stats_line(&snapshot));
        }
        lines
    }

    fn new_entries(&mut self, entries: &VecDeque<ActivityEntry>) -> Vec<String> {
        let now = Utc::now();
        let last = self.last_entry;
        // Ledger is newest-first; print oldest-first.
        let fresh: Vec<String> = entries
            .iter()
            .take_while(|e| last.map_or(true, |id| e.id > id))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|e| {
                format!(
                    "{} {:<7} {} ({})",
                    e.category.indicator(),
                    e.category.label(),
                    e.message,
                    e.age_label(now)
                )
            })
            .collect();
        if let Some(newest) = entries.front() {
            self.last_entry = Some(newest.id);
        }
        fresh
    }

    fn new_diagnostics(&mut self, recent: &VecDeque<Diagnostic>) -> Vec<String> {
        // Oldest first; everything after the last printed report is new.
        let start = self
            .last_diagnostic
            .as_ref()
            .and_then(|last| recent.iter().rposition(|d| d == last))
            .map_or(0, |i| i + 1);
        self.last_diagnostic = recent.back().cloned();
        recent
            .iter()
            .skip(start)
            .map(|d| format!("!! {}: {}", d.source.context(), d.detail))
            .collect()
    }

    fn new_toasts(&mut self, toasts: &[Notification]) -> Vec<String> {
        let lines = toasts
            .iter()
            .filter(|t| !self.seen_toasts.contains(&t.id))
            .map(|t| format!("   {} {}", t.category.icon(), t.message))
            .collect();
        self.seen_toasts = toasts.iter().map(|t| t.id).collect();
        lines
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("last_entry", &self.last_entry)
            .field("seen_toasts", &self.seen_toasts.len())
            .finish_non_exhaustive()
    }
}

/// One-line statistics summary with trend arrows.
pub fn stats_line(snapshot: &StatsSnapshot) -> String {
    let healthy = snapshot.endpoints().iter().filter(|e| e.is_healthy()).count();
    format!(
        "   requests {} {} | latency {:.0}ms {} | cache {}% {} | endpoints {}/{} healthy",
        format_count(snapshot.total_requests.unwrap_or(0)),
        snapshot.request_trend().arrow(),
        snapshot.average_latency_ms(),
        snapshot.latency_trend().arrow(),
        snapshot.cache_hit_percent(),
        snapshot.cache_trend().arrow(),
        healthy,
        snapshot.endpoints().len(),
    )
}

/// Final report: balances, endpoint table and totals.
pub fn summary(core: &AppCore) -> Vec<String> {
    let mut lines = vec!["== summary ==".to_string()];
    lines.extend(wallet_rows(core));
    lines.push(format!(
        "   total {}",
        format_sol_total(core.balances().total_lamports())
    ));

    if let Some(snapshot) = core.stats() {
        lines.push(stats_line(&snapshot));
        for endpoint in snapshot.endpoints() {
            lines.push(format!(
                "   {:<14} {:>6} req  {:>5}% err  {:>6.0}ms  {}",
                endpoint.name,
                format_count(endpoint.requests.unwrap_or(0)),
                endpoint.error_rate_percent(),
                endpoint.avg_latency_ms(),
                endpoint.circuit().label(),
            ));
        }
    }
    lines.push(format!("   diagnostics {}", core.diagnostics().len()));
    lines
}

/// One row per tracked wallet, in tracking order.
fn wallet_rows(core: &AppCore) -> Vec<String> {
    let records = core.balances().records();
    core.config()
        .wallets
        .iter()
        .zip(records)
        .map(|(wallet, record)| {
            let balance = match (record.balance, record.loading) {
                (_, true) => "...".to_string(),
                (Some(lamports), false) => format!("{} SOL", format_sol(lamports)),
                (None, false) => "-".to_string(),
            };
            format!(
                "   {:<18} {:<13} {balance:>14}",
                wallet.name,
                shorten_address(&wallet.address, 4)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runic_app::{EndpointStats, MonitorConfig, RpcClient};
    use std::sync::Arc;

    use crate::sim::{SimOptions, SimulatedClient};

    fn core() -> AppCore {
        let config = MonitorConfig::default();
        let client: Arc<dyn RpcClient> = Arc::new(SimulatedClient::new(
            config.client.clone(),
            SimOptions {
                failure_rate: 0.0,
                seed: Some(1),
                ..SimOptions::default()
            },
        ));
        AppCore::new(config, client).unwrap()
    }

    #[test]
    fn test_activity_printed_once_oldest_first() {
        let core = core();
        let mut renderer = Renderer::new(&core);
        core.activity().record(runic_app::ActivityCategory::Request, "first");
        core.activity().record(runic_app::ActivityCategory::Cache, "second");

        let lines = renderer.drain();
        let first = lines.iter().position(|l| l.contains("first")).unwrap();
        let second = lines.iter().position(|l| l.contains("second")).unwrap();
        assert!(first < second);

        assert!(renderer.drain().is_empty());
        core.activity().record(runic_app::ActivityCategory::Error, "third");
        let lines = renderer.drain();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("third"));
    }

    #[test]
    fn test_diagnostics_printed_once() {
        let core = core();
        let mut renderer = Renderer::new(&core);
        core.diagnostics()
            .report(runic_app::DiagnosticSource::StatsPoll, "boom");
        let lines = renderer.drain();
        assert_eq!(lines, vec!["!! Failed to get stats: boom".to_string()]);

        core.diagnostics()
            .report(runic_app::DiagnosticSource::Refetch, "again");
        assert_eq!(renderer.drain(), vec!["!! Refetch failed: again".to_string()]);
    }

    #[test]
    fn test_stats_line_shows_trends() {
        let snapshot = StatsSnapshot {
            total_requests: Some(1_200),
            total_errors: Some(0),
            cache_hit_rate: Some(0.75),
            endpoints: Some(vec![EndpointStats {
                name: "public".into(),
                ..EndpointStats::default()
            }]),
        };
        let line = stats_line(&snapshot);
        assert!(line.contains("1.20K"));
        assert!(line.contains("75.0%"));
        assert!(line.contains("1/1 healthy"));
    }

    #[test]
    fn test_summary_lists_every_wallet() {
        let core = core();
        let lines = summary(&core);
        for wallet in &core.config().wallets {
            assert!(lines.iter().any(|l| l.contains(&wallet.name)));
        }
        assert!(lines.iter().any(|l| l.contains("total 0.00 SOL")));
        assert!(lines.iter().any(|l| l.ends_with("diagnostics 0")));
    }
}
