//! # Notification Dispatcher
//!
//! Gated fan-out of activity into short-lived toasts.
//!
//! - Dispatch is a silent no-op while notifications are disabled (the
//!   default; users opt in).
//! - Every toast expires on its own after the display duration.
//! - Expiry and manual dismissal share one idempotent removal path; a manual
//!   dismissal also cancels the pending expiry timer.
//! - Dispatch works from any thread. Expiry timers run on the caller's
//!   runtime, or on the runtime the center was created on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::activity::ActivityCategory;
use crate::reactive::{Observable, Watcher};

/// Default time a toast stays visible.
pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 5_000;

/// Toast category. Not the same taxonomy as [`ActivityCategory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
    /// Neutral information
    Info,
    /// Served from cache
    Cache,
    /// Retry in progress
    Retry,
}

impl NotificationCategory {
    /// Indicator glyph used by renderers.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✗",
            Self::Info => "ℹ",
            Self::Cache => "⚡",
            Self::Retry => "⚠",
        }
    }

    /// Whether this is an error-level toast.
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl From<ActivityCategory> for NotificationCategory {
    fn from(category: ActivityCategory) -> Self {
        match category {
            ActivityCategory::Request => Self::Info,
            ActivityCategory::Cache => Self::Cache,
            ActivityCategory::Retry => Self::Retry,
            ActivityCategory::Error => Self::Error,
        }
    }
}

/// Identifier of a toast, unique within its center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

/// Why a toast left the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Removal {
    Expired,
    Dismissed,
}

/// Handle that removes one specific toast.
///
/// Holds only a weak reference, so a toast outliving its center is inert.
#[derive(Clone)]
pub struct ReleaseHandle {
    id: NotificationId,
    center: Weak<CenterInner>,
}

impl ReleaseHandle {
    /// Dismiss the toast this handle is bound to.
    ///
    /// Returns `false` if it was already gone.
    pub fn release(&self) -> bool {
        self.center
            .upgrade()
            .is_some_and(|inner| inner.remove(self.id, Removal::Dismissed))
    }
}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHandle").field("id", &self.id).finish()
    }
}

/// A visible toast.
#[derive(Clone, Debug)]
pub struct Notification {
    /// Unique identifier
    pub id: NotificationId,
    /// Toast category
    pub category: NotificationCategory,
    /// Display text
    pub message: String,
    /// When it was dispatched
    pub created_at: DateTime<Utc>,
    release: ReleaseHandle,
}

impl Notification {
    /// Dismiss this toast. Same as [`NotificationCenter::dismiss`] with its id.
    pub fn release(&self) -> bool {
        self.release.release()
    }
}

impl PartialEq for Notification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.category == other.category
            && self.message == other.message
            && self.created_at == other.created_at
    }
}

struct CenterInner {
    enabled: AtomicBool,
    ttl: Duration,
    next_id: AtomicU64,
    active: Observable<Vec<Notification>>,
    timers: Mutex<HashMap<NotificationId, AbortHandle>>,
    runtime: Option<Handle>,
}

impl CenterInner {
    fn remove(&self, id: NotificationId, cause: Removal) -> bool {
        if let Some(timer) = self.timers.lock().remove(&id) {
            if cause == Removal::Dismissed {
                timer.abort();
            }
        }
        let removed = self
            .active
            .try_update(|list| {
                let index = list.iter().position(|n| n.id == id)?;
                Some(list.remove(index))
            })
            .is_some();
        if removed {
            tracing::debug!(%id, ?cause, "notification removed");
        }
        removed
    }
}

impl Drop for CenterInner {
    fn drop(&mut self) {
        for (_, timer) in self.timers.get_mut().drain() {
            timer.abort();
        }
    }
}

/// Session-wide toast dispatcher.
///
/// Cloning yields another handle to the same center.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

impl NotificationCenter {
    /// Create a disabled center whose toasts live for `ttl`.
    ///
    /// When called inside a tokio runtime, that runtime hosts expiry timers
    /// for toasts dispatched from threads outside any runtime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CenterInner {
                enabled: AtomicBool::new(false),
                ttl,
                next_id: AtomicU64::new(1),
                active: Observable::new(Vec::new()),
                timers: Mutex::new(HashMap::new()),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Whether dispatch currently produces toasts.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Flip the enabled flag and return the new value.
    pub fn toggle(&self) -> bool {
        let enabled = !self.inner.enabled.fetch_xor(true, Ordering::AcqRel);
        tracing::debug!(enabled, "notifications toggled");
        enabled
    }

    /// Set the enabled flag.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    /// Display duration of each toast.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Show a toast, unless notifications are disabled.
    ///
    /// Returns `None` without showing anything when no runtime is available
    /// to host the expiry timer.
    pub fn dispatch(
        &self,
        category: NotificationCategory,
        message: impl Into<String>,
    ) -> Option<NotificationId> {
        if !self.is_enabled() {
            return None;
        }

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.inner.runtime.clone())
        else {
            tracing::warn!("no runtime to expire notifications, toast dropped");
            return None;
        };

        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification {
            id,
            category,
            message: message.into(),
            created_at: Utc::now(),
            release: ReleaseHandle {
                id,
                center: Arc::downgrade(&self.inner),
            },
        };
        let ttl = self.inner.ttl;
        let center = Arc::downgrade(&self.inner);
        // Removal takes this lock first, so the timer cannot fire before the
        // toast is listed.
        let mut timers = self.inner.timers.lock();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = center.upgrade() {
                inner.remove(id, Removal::Expired);
            }
        });
        self.inner.active.update(|list| list.push(notification));
        timers.insert(id, timer.abort_handle());
        Some(id)
    }

    /// Dismiss a toast by id. Idempotent.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.inner.remove(id, Removal::Dismissed)
    }

    /// Currently visible toasts, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.inner.active.get()
    }

    /// Number of visible toasts.
    pub fn len(&self) -> usize {
        self.inner.active.with(Vec::len)
    }

    /// Whether no toast is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watch the toast list for redraws.
    pub fn watch(&self) -> Watcher<Vec<Notification>> {
        self.inner.active.watch()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_NOTIFICATION_TTL_MS))
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.inner.ttl)
            .field("active", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_to_info() {
        assert_eq!(
            NotificationCategory::from(ActivityCategory::Request),
            NotificationCategory::Info
        );
        assert_eq!(
            NotificationCategory::from(ActivityCategory::Cache),
            NotificationCategory::Cache
        );
        assert_eq!(
            NotificationCategory::from(ActivityCategory::Retry),
            NotificationCategory::Retry
        );
        assert_eq!(
            NotificationCategory::from(ActivityCategory::Error),
            NotificationCategory::Error
        );
    }

    #[test]
    fn test_starts_disabled_and_toggles() {
        let center = NotificationCenter::default();
        assert!(!center.is_enabled());
        assert!(center.toggle());
        assert!(center.is_enabled());
        assert!(!center.toggle());
    }

    #[test]
    fn test_disabled_dispatch_needs_no_runtime() {
        let center = NotificationCenter::default();
        assert_eq!(center.dispatch(NotificationCategory::Error, "nope"), None);
        assert!(center.is_empty());
    }

    #[test]
    fn test_enabled_dispatch_without_runtime_is_dropped() {
        let center = NotificationCenter::default();
        center.set_enabled(true);
        assert_eq!(center.dispatch(NotificationCategory::Info, "lost"), None);
        assert!(center.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_handle_dismisses() {
        let center = NotificationCenter::default();
        center.set_enabled(true);
        center.dispatch(NotificationCategory::Info, "hello");

        let toast = center.active().remove(0);
        assert!(toast.release());
        assert!(!toast.release());
        assert!(center.is_empty());
    }
}
