//! Session controller.
//!
//! `AppCore` owns every piece of session state and drives the lifecycle.
//! Entering the dashboard installs one [`DashboardScope`]: the dashboard
//! event subscriptions, the stats poller and the refetch registration. The
//! three live and die together.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::activity::ActivityLedger;
use crate::balances::BalanceBook;
use crate::client::SharedClient;
use crate::config::MonitorConfig;
use crate::diagnostics::{DiagnosticSource, Diagnostics};
use crate::errors::{AppError, ConfigError};
use crate::feed::ActivityFeed;
use crate::fetch::{BalanceFetcher, FetchOutcome, SweepReport};
use crate::lifecycle::{AppPhase, LifecycleMachine, LifecycleTrigger};
use crate::notifications::NotificationCenter;
use crate::poller::{PollerHandle, StatsPoller};
use crate::reactive::{Observable, Watcher};
use crate::refetch::{RefetchCoordinator, RefetchFn, RefetchOutcome, ScopedRegistration};
use crate::stats::StatsSnapshot;
use crate::subscriptions::{feed_sink, ScopeKind, SubscriptionScope};

/// Resources active while the dashboard is shown.
///
/// Field order is drop order: handlers go first.
struct DashboardScope {
    _subscriptions: SubscriptionScope,
    _poller: PollerHandle,
    _refetch: ScopedRegistration,
}

struct CoreInner {
    config: MonitorConfig,
    client: SharedClient,
    lifecycle: LifecycleMachine,
    notifications: NotificationCenter,
    activity: Arc<ActivityLedger>,
    feed: ActivityFeed,
    book: BalanceBook,
    stats: Observable<Option<StatsSnapshot>>,
    diagnostics: Diagnostics,
    refetch: RefetchCoordinator,
    fetcher: BalanceFetcher,
    dashboard: Mutex<Option<DashboardScope>>,
}

/// The observability controller for one session.
#[derive(Clone)]
pub struct AppCore {
    inner: Arc<CoreInner>,
}

impl AppCore {
    /// Build a session in the welcome phase.
    pub fn new(config: MonitorConfig, client: SharedClient) -> Result<Self, ConfigError> {
        config.validate()?;

        let notifications = NotificationCenter::new(config.timing.notification_ttl());
        let activity = Arc::new(ActivityLedger::new(config.capacity.dashboard));
        let feed = ActivityFeed::new(activity.clone()).with_notifications(notifications.clone());
        let book = BalanceBook::new(config.wallets.iter().map(|w| w.address.clone()));
        let diagnostics = Diagnostics::new(config.capacity.diagnostics);
        let fetcher = BalanceFetcher::new(
            client.clone(),
            book.clone(),
            feed.clone(),
            diagnostics.clone(),
            config.timing.pacing(),
        );

        tracing::debug!(wallets = config.wallets.len(), "session created");
        Ok(Self {
            inner: Arc::new(CoreInner {
                config,
                client,
                lifecycle: LifecycleMachine::new(),
                notifications,
                activity,
                feed,
                book,
                stats: Observable::new(None),
                diagnostics,
                refetch: RefetchCoordinator::new(),
                fetcher,
                dashboard: Mutex::new(None),
            }),
        })
    }

    /// User pressed start.
    ///
    /// Loads every balance, waits the settle delay and enters the dashboard.
    /// Returns `None` without doing anything unless the session is still on
    /// the welcome screen.
    pub async fn start(&self) -> Option<SweepReport> {
        self.inner.lifecycle.fire(LifecycleTrigger::Start)?;
        tracing::info!(wallets = self.inner.config.wallets.len(), "loading balances");

        let report = self.inner.fetcher.fetch_all().await;
        tokio::time::sleep(self.inner.config.timing.settle_delay()).await;

        if self.inner.lifecycle.fire(LifecycleTrigger::Settled).is_some() {
            self.enter_dashboard();
            tracing::info!(
                updated = report.updated,
                failed = report.failed + report.rate_limited,
                "dashboard ready"
            );
        }
        Some(report)
    }

    fn enter_dashboard(&self) {
        let inner = &self.inner;
        // Old handlers must be gone before new ones are installed. The slot
        // lock is never held while the client runs.
        let previous = inner.dashboard.lock().take();
        drop(previous);

        let subscriptions = SubscriptionScope::bind(
            inner.client.clone(),
            ScopeKind::Dashboard,
            feed_sink(inner.feed.clone()),
        );
        let poller = StatsPoller::new(
            inner.client.clone(),
            inner.diagnostics.clone(),
            inner.stats.clone(),
            inner.config.timing.stats_interval(),
        )
        .spawn();
        let fetcher = inner.fetcher.clone();
        let routine: RefetchFn = Arc::new(move || {
            let fetcher = fetcher.clone();
            async move {
                fetcher.fetch_all().await;
                Ok(())
            }
            .boxed()
        });
        let refetch = inner.refetch.scoped(routine);

        let scope = DashboardScope {
            _subscriptions: subscriptions,
            _poller: poller,
            _refetch: refetch,
        };
        let replaced = inner.dashboard.lock().replace(scope);
        drop(replaced);
    }

    /// Re-fetch every balance, unless a refetch is already running.
    ///
    /// Outside the dashboard nothing is registered and this is a no-op.
    pub async fn refetch(&self) -> Result<RefetchOutcome, AppError> {
        match self.inner.refetch.refetch().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.inner
                    .diagnostics
                    .report(DiagnosticSource::Refetch, err.to_string());
                tracing::warn!(error = %err, "refetch sweep failed");
                Err(err)
            }
        }
    }

    /// Fetch one wallet's balance outside a sweep.
    pub async fn fetch_balance(&self, address: &str) -> FetchOutcome {
        self.inner.fetcher.fetch_balance(address).await
    }

    /// Flip the notification flag. Returns the new state.
    pub fn toggle_notifications(&self) -> bool {
        self.inner.notifications.toggle()
    }

    /// Open the dedicated activity view with its own ledger and subscriptions.
    pub fn open_activity_view(&self) -> ActivityView {
        let ledger = Arc::new(ActivityLedger::new(
            self.inner.config.capacity.activity_view,
        ));
        let scope = SubscriptionScope::bind(
            self.inner.client.clone(),
            ScopeKind::ActivityView,
            feed_sink(ActivityFeed::new(ledger.clone())),
        );
        ActivityView {
            ledger,
            _scope: scope,
        }
    }

    /// Tear down the dashboard scope. The session state is kept.
    pub fn shutdown(&self) {
        let scope = self.inner.dashboard.lock().take();
        if let Some(scope) = scope {
            drop(scope);
            tracing::info!("dashboard scope released");
        }
    }

    /// Whether the dashboard scope is installed.
    pub fn is_dashboard_active(&self) -> bool {
        self.inner.dashboard.lock().is_some()
    }

    /// Current phase.
    pub fn phase(&self) -> AppPhase {
        self.inner.lifecycle.phase()
    }

    /// Watch phase changes.
    pub fn watch_phase(&self) -> Watcher<AppPhase> {
        self.inner.lifecycle.watch()
    }

    /// Effective configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Dashboard activity ledger.
    pub fn activity(&self) -> &Arc<ActivityLedger> {
        &self.inner.activity
    }

    /// Toast dispatcher.
    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    /// Balance records.
    pub fn balances(&self) -> &BalanceBook {
        &self.inner.book
    }

    /// Latest published statistics snapshot.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.inner.stats.get()
    }

    /// Watch statistics snapshots.
    pub fn watch_stats(&self) -> Watcher<Option<StatsSnapshot>> {
        self.inner.stats.watch()
    }

    /// Diagnostic channel.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    /// Shared refetch coordinator, for surfaces that install their own
    /// routine.
    pub fn refetch_coordinator(&self) -> &RefetchCoordinator {
        &self.inner.refetch
    }

    /// Whether a refetch is in flight.
    pub fn is_refetching(&self) -> bool {
        self.inner.refetch.is_refetching()
    }
}

impl std::fmt::Debug for AppCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCore")
            .field("phase", &self.phase())
            .field("dashboard_active", &self.is_dashboard_active())
            .field("refetch", &self.inner.refetch)
            .finish_non_exhaustive()
    }
}

/// The activity view: its own ledger, fed by every request event.
///
/// Dropping the view unsubscribes it.
#[derive(Debug)]
pub struct ActivityView {
    ledger: Arc<ActivityLedger>,
    _scope: SubscriptionScope,
}

impl ActivityView {
    /// The view's ledger.
    pub fn ledger(&self) -> &Arc<ActivityLedger> {
        &self.ledger
    }

    /// Close the view now.
    pub fn close(self) {}
}
