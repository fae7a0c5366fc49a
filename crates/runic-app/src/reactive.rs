//! Observable<T> - a shared value with version-tracked change detection
//!
//! Every piece of session state the UI renders (activity feeds, toast list,
//! balance records, the latest stats snapshot, the lifecycle phase) lives in
//! an `Observable`. Writers replace or update the value; renderers hold a
//! `Watcher` and poll it, redrawing only when the version moved.
//!
//! Locks are `parking_lot` locks and are never held across an `.await`, so
//! writes from event handlers, poll ticks and fetch completions apply in the
//! order their callbacks run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

struct ObservableInner<T> {
    value: RwLock<T>,
    version: AtomicU64,
}

/// A shared value that can be watched for changes.
///
/// Cloning an `Observable` yields another handle to the same value.
#[derive(Clone)]
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Create a new observable holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Read the current value in place without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Number of writes applied so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.inner.version.fetch_add(1, Ordering::Release);
    }

    /// Mutate the value under the write lock and bump the version.
    ///
    /// The closure's return value is passed back to the caller, which lets
    /// writers report what they changed without a second read.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = {
            let mut guard = self.inner.value.write();
            f(&mut guard)
        };
        self.inner.version.fetch_add(1, Ordering::Release);
        out
    }

    /// Mutate the value only if `f` reports a change.
    ///
    /// The version moves only when `f` returns `Some`, so a rejected
    /// write is invisible to watchers.
    pub fn try_update<R>(&self, f: impl FnOnce(&mut T) -> Option<R>) -> Option<R> {
        let out = {
            let mut guard = self.inner.value.write();
            f(&mut guard)
        };
        if out.is_some() {
            self.inner.version.fetch_add(1, Ordering::Release);
        }
        out
    }

    /// Watch for subsequent writes.
    ///
    /// The watcher starts at the current version, so a fresh watcher
    /// reports no change until the next write.
    pub fn watch(&self) -> Watcher<T> {
        Watcher {
            source: self.inner.clone(),
            seen: self.inner.version.load(Ordering::Acquire),
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.read())
            .field("version", &self.version())
            .finish()
    }
}

/// Poll-based change detector for an [`Observable`].
///
/// Several writes between two polls coalesce into one observed change.
pub struct Watcher<T> {
    source: Arc<ObservableInner<T>>,
    seen: u64,
}

impl<T: Clone + Send + Sync + 'static> Watcher<T> {
    /// Whether the source was written since the last poll.
    pub fn has_changed(&self) -> bool {
        self.source.version.load(Ordering::Acquire) > self.seen
    }

    /// Return the latest value if it changed since the last poll.
    pub fn poll(&mut self) -> Option<T> {
        let current = self.source.version.load(Ordering::Acquire);
        if current > self.seen {
            self.seen = current;
            Some(self.source.value.read().clone())
        } else {
            None
        }
    }

    /// Current value regardless of change state.
    pub fn get(&self) -> T {
        self.source.value.read().clone()
    }
}
