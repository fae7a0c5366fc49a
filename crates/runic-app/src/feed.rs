//! Activity feed: a ledger plus optional toast fan-out.
//!
//! The dashboard records every line into its ledger and mirrors it as a
//! toast; the activity view records only. Both go through `ActivityFeed` so
//! the two behaviours differ by construction, not by call site.

use std::sync::Arc;

use crate::activity::{ActivityCategory, ActivityEntry, ActivityLedger};
use crate::notifications::NotificationCenter;

/// Recording front-end shared by fetch routines and event scopes.
#[derive(Clone, Debug)]
pub struct ActivityFeed {
    ledger: Arc<ActivityLedger>,
    notifications: Option<NotificationCenter>,
}

impl ActivityFeed {
    /// Feed that records into `ledger` only.
    pub fn new(ledger: Arc<ActivityLedger>) -> Self {
        Self {
            ledger,
            notifications: None,
        }
    }

    /// Also dispatch every recorded line to `center`.
    pub fn with_notifications(mut self, center: NotificationCenter) -> Self {
        self.notifications = Some(center);
        self
    }

    /// Record a line, and mirror it as a toast if this feed has a center.
    pub fn record(&self, category: ActivityCategory, message: impl Into<String>) -> ActivityEntry {
        let entry = self.ledger.record(category, message);
        if let Some(center) = &self.notifications {
            center.dispatch(category.into(), entry.message.clone());
        }
        entry
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<ActivityLedger> {
        &self.ledger
    }
}
