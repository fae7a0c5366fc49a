//! Application lifecycle: welcome, loading, dashboard.
//!
//! [`transition`] is the whole state machine. [`LifecycleMachine`] applies it
//! atomically to the session's phase; side effects belong to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reactive::{Observable, Watcher};

/// Top-level screen phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPhase {
    /// Landing screen, waiting for the user to start
    #[default]
    Welcome,
    /// Initial bulk load in progress
    Loading,
    /// Live dashboard
    Dashboard,
}

impl AppPhase {
    /// Lowercase phase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Loading => "loading",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the lifecycle machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleTrigger {
    /// User pressed start
    Start,
    /// Bulk load finished and the settle delay elapsed
    Settled,
}

/// Next phase for `trigger` in `phase`, or `None` when the trigger does not apply.
pub fn transition(phase: AppPhase, trigger: LifecycleTrigger) -> Option<AppPhase> {
    use AppPhase::*;
    use LifecycleTrigger::*;

    match (phase, trigger) {
        (Welcome, Start) => Some(Loading),
        (Loading, Settled) => Some(Dashboard),
        // Start is ignored once loading has begun; nothing leads back.
        (Loading | Dashboard, Start) => None,
        (Welcome | Dashboard, Settled) => None,
    }
}

/// Owner of the session's current phase.
#[derive(Clone, Debug, Default)]
pub struct LifecycleMachine {
    phase: Observable<AppPhase>,
}

impl LifecycleMachine {
    /// Machine in [`AppPhase::Welcome`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> AppPhase {
        self.phase.get()
    }

    /// Apply `trigger`. Returns the new phase if a transition happened.
    pub fn fire(&self, trigger: LifecycleTrigger) -> Option<AppPhase> {
        let moved = self.phase.try_update(|phase| {
            let from = *phase;
            let to = transition(from, trigger)?;
            *phase = to;
            Some((from, to))
        });
        match moved {
            Some((from, to)) => {
                tracing::debug!(%from, %to, ?trigger, "lifecycle transition");
                Some(to)
            }
            None => {
                tracing::debug!(?trigger, "lifecycle trigger ignored");
                None
            }
        }
    }

    /// Watch phase changes.
    pub fn watch(&self) -> Watcher<AppPhase> {
        self.phase.watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_happy_path() {
        let machine = LifecycleMachine::new();
        assert_eq!(machine.phase(), AppPhase::Welcome);
        assert_eq!(
            machine.fire(LifecycleTrigger::Start),
            Some(AppPhase::Loading)
        );
        assert_eq!(
            machine.fire(LifecycleTrigger::Settled),
            Some(AppPhase::Dashboard)
        );
    }

    #[test]
    fn test_start_is_noop_after_welcome() {
        assert_eq!(transition(AppPhase::Loading, LifecycleTrigger::Start), None);
        assert_eq!(
            transition(AppPhase::Dashboard, LifecycleTrigger::Start),
            None
        );
    }

    #[test]
    fn test_settled_needs_loading() {
        assert_eq!(
            transition(AppPhase::Welcome, LifecycleTrigger::Settled),
            None
        );
    }

    #[test]
    fn test_ignored_trigger_does_not_wake_watchers() {
        let machine = LifecycleMachine::new();
        let mut watcher = machine.watch();
        machine.fire(LifecycleTrigger::Settled);
        assert_eq!(watcher.poll(), None);
        machine.fire(LifecycleTrigger::Start);
        assert_eq!(watcher.poll(), Some(AppPhase::Loading));
    }

    fn trigger() -> impl Strategy<Value = LifecycleTrigger> {
        prop_oneof![
            Just(LifecycleTrigger::Start),
            Just(LifecycleTrigger::Settled)
        ]
    }

    fn rank(phase: AppPhase) -> u8 {
        match phase {
            AppPhase::Welcome => 0,
            AppPhase::Loading => 1,
            AppPhase::Dashboard => 2,
        }
    }

    proptest! {
        #[test]
        fn prop_phase_only_moves_forward(triggers in prop::collection::vec(trigger(), 0..32)) {
            let machine = LifecycleMachine::new();
            let mut last = machine.phase();
            for t in triggers {
                machine.fire(t);
                let now = machine.phase();
                prop_assert!(rank(now) >= rank(last));
                prop_assert!(rank(now) - rank(last) <= 1);
                last = now;
            }
        }

        #[test]
        fn prop_dashboard_is_absorbing(triggers in prop::collection::vec(trigger(), 0..16)) {
            let mut phase = AppPhase::Dashboard;
            for t in triggers {
                if let Some(next) = transition(phase, t) {
                    phase = next;
                }
            }
            prop_assert_eq!(phase, AppPhase::Dashboard);
        }
    }
}
