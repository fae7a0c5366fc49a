//! Runic App - Observability Controller Core
//!
//! Headless session controller for a wallet dashboard sitting on top of the
//! runicRPC load-balancing client. The balancer itself (routing, caching,
//! retries, circuit breaking) is external and reached through the
//! [`RpcClient`] trait; this crate turns its events and statistics into
//! renderable session state.
//!
//! # Session State
//!
//! - Lifecycle: `welcome` → `loading` → `dashboard`, forward only
//! - Activity ledgers: newest-first, capped at 50 (dashboard) and 100
//!   (activity view)
//! - Notifications: opt-in toasts with a 5 second lifetime
//! - Balance book: one record per tracked wallet
//! - Stats: latest snapshot from a 2 second poll
//!
//! # Scopes
//!
//! Subscriptions, the stats poller and the refetch registration are tied to
//! guards. Dropping a guard detaches what it installed; nothing else does.
//!
//! Every piece of state is held in an [`Observable`] so a frontend can poll
//! a [`Watcher`] and redraw on change.

#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Activity entries and the bounded ledger
pub mod activity;

/// Tracked wallets and balance records
pub mod balances;

/// Boundary trait for the external RPC client
pub mod client;

/// Monitor configuration and environment overrides
pub mod config;

/// Session controller
pub mod controller;

/// Diagnostic channel for unexpected failures
pub mod diagnostics;

/// Error types
pub mod errors;

/// Typed client events
pub mod events;

/// Activity recording with optional toast fan-out
pub mod feed;

/// Balance fetch routines
pub mod fetch;

/// Display formatting helpers
pub mod format;

/// Lifecycle state machine
pub mod lifecycle;

/// Toast notifications
pub mod notifications;

/// Statistics polling
pub mod poller;

/// Version-tracked shared values
pub mod reactive;

/// Single-flight refetch coordination
pub mod refetch;

/// Statistics snapshot model
pub mod stats;

/// Scoped event subscriptions
pub mod subscriptions;

pub use activity::{
    ActivityCategory, ActivityEntry, ActivityLedger, EntryId, ACTIVITY_VIEW_CAPACITY,
    DASHBOARD_ACTIVITY_CAPACITY,
};
pub use balances::{demo_wallets, BalanceBook, LoadProgress, TrackedWallet, WalletBalanceRecord};
pub use client::{EventHandler, HandlerId, RpcClient, SharedClient};
pub use config::{ClientSettings, LogLevel, MonitorConfig, RoutingStrategy};
pub use controller::{ActivityView, AppCore};
pub use diagnostics::{Diagnostic, DiagnosticSource, Diagnostics};
pub use errors::{AppError, ClientError, ConfigError, DecodeError, FailureKind};
pub use events::{ClientEvent, EventName};
pub use feed::ActivityFeed;
pub use fetch::{BalanceFetcher, FetchOutcome, SweepReport};
pub use lifecycle::{transition, AppPhase, LifecycleMachine, LifecycleTrigger};
pub use notifications::{Notification, NotificationCategory, NotificationCenter, NotificationId};
pub use poller::{PollerHandle, StatsPoller};
pub use reactive::{Observable, Watcher};
pub use refetch::{
    RefetchCoordinator, RefetchFn, RefetchOutcome, RegistrationToken, ScopedRegistration,
};
pub use stats::{CircuitState, EndpointStats, LatencyStats, StatsSnapshot, Trend};
pub use subscriptions::{EventSink, ScopeKind, SubscriptionScope};
