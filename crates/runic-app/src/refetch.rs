//! Single-flight refetch coordination.
//!
//! One routine may be registered at a time; registering replaces the
//! previous one. `refetch()` runs the registered routine unless a run is
//! already in flight, in which case it returns immediately. Nothing queues
//! and nothing is cancelled.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::errors::AppError;

/// A registered refetch routine.
pub type RefetchFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), AppError>> + Send + Sync>;

/// Identifies one registration so its owner can clear only its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

/// What a call to [`RefetchCoordinator::refetch`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefetchOutcome {
    /// The registered routine ran to completion
    Completed,
    /// Another run was in flight; this call did nothing
    AlreadyRunning,
    /// Nothing is registered; this call did nothing
    NotRegistered,
}

struct Registration {
    token: RegistrationToken,
    routine: RefetchFn,
}

#[derive(Default)]
struct CoordinatorInner {
    registration: Mutex<Option<Registration>>,
    next_token: AtomicU64,
    running: AtomicBool,
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Session-wide refetch slot.
#[derive(Clone, Default)]
pub struct RefetchCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefetchCoordinator {
    /// Empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `routine`, replacing any previous registration.
    pub fn register(&self, routine: RefetchFn) -> RegistrationToken {
        let token = RegistrationToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .inner
            .registration
            .lock()
            .replace(Registration { token, routine });
        tracing::debug!(
            ?token,
            replaced = previous.is_some(),
            "refetch routine registered"
        );
        token
    }

    /// Install an async closure.
    pub fn register_fn<F, Fut>(&self, routine: F) -> RegistrationToken
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.register(Arc::new(move || routine().boxed()))
    }

    /// Install `routine` for as long as the returned guard lives.
    pub fn scoped(&self, routine: RefetchFn) -> ScopedRegistration {
        ScopedRegistration {
            coordinator: self.clone(),
            token: self.register(routine),
        }
    }

    /// Clear whatever is registered.
    pub fn unregister(&self) {
        if self.inner.registration.lock().take().is_some() {
            tracing::debug!("refetch routine unregistered");
        }
    }

    /// Clear the registration only if it is still the one `token` names.
    pub fn unregister_if(&self, token: RegistrationToken) -> bool {
        let mut slot = self.inner.registration.lock();
        if slot.as_ref().is_some_and(|r| r.token == token) {
            *slot = None;
            drop(slot);
            tracing::debug!(?token, "refetch routine unregistered");
            true
        } else {
            false
        }
    }

    /// Whether a routine is registered.
    pub fn is_registered(&self) -> bool {
        self.inner.registration.lock().is_some()
    }

    /// Whether a run is in flight.
    pub fn is_refetching(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Run the registered routine unless one is already running.
    ///
    /// A failing routine still releases the in-flight flag; its error is
    /// returned to this caller only.
    pub async fn refetch(&self) -> Result<RefetchOutcome, AppError> {
        let routine = self
            .inner
            .registration
            .lock()
            .as_ref()
            .map(|r| r.routine.clone());
        let Some(routine) = routine else {
            tracing::debug!("refetch requested with nothing registered");
            return Ok(RefetchOutcome::NotRegistered);
        };

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("refetch already in flight");
            return Ok(RefetchOutcome::AlreadyRunning);
        }
        let _in_flight = InFlight(&self.inner.running);

        routine().await?;
        Ok(RefetchOutcome::Completed)
    }
}

impl fmt::Debug for RefetchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefetchCoordinator")
            .field("registered", &self.is_registered())
            .field("refetching", &self.is_refetching())
            .finish()
    }
}

/// Registration that is cleared on drop, unless something replaced it.
#[derive(Debug)]
pub struct ScopedRegistration {
    coordinator: RefetchCoordinator,
    token: RegistrationToken,
}

impl ScopedRegistration {
    /// Token of the guarded registration.
    pub fn token(&self) -> RegistrationToken {
        self.token
    }
}

impl Drop for ScopedRegistration {
    fn drop(&mut self) {
        self.coordinator.unregister_if(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: Arc<AtomicUsize>) -> RefetchFn {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_not_registered_is_noop() {
        let coordinator = RefetchCoordinator::new();
        assert_eq!(
            coordinator.refetch().await.unwrap(),
            RefetchOutcome::NotRegistered
        );
        assert!(!coordinator.is_refetching());
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let coordinator = RefetchCoordinator::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        coordinator.register(counting(first.clone()));
        coordinator.register(counting(second.clone()));

        assert_eq!(
            coordinator.refetch().await.unwrap(),
            RefetchOutcome::Completed
        );
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_releases_flag() {
        let coordinator = RefetchCoordinator::new();
        coordinator.register_fn(|| async { Err(AppError::refetch("sweep broke")) });
        let err = coordinator.refetch().await.unwrap_err();
        assert_eq!(err, AppError::refetch("sweep broke"));
        assert!(!coordinator.is_refetching());
    }

    #[test]
    fn test_scoped_guard_only_clears_its_own() {
        let coordinator = RefetchCoordinator::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let old = coordinator.scoped(counting(counter.clone()));
        let newer = coordinator.register(counting(counter));
        drop(old);
        assert!(coordinator.is_registered());

        assert!(coordinator.unregister_if(newer));
        assert!(!coordinator.is_registered());
    }

    #[test]
    fn test_scoped_guard_clears_on_drop() {
        let coordinator = RefetchCoordinator::new();
        let guard = coordinator.scoped(counting(Arc::new(AtomicUsize::new(0))));
        assert!(coordinator.is_registered());
        drop(guard);
        assert!(!coordinator.is_registered());
    }
}
