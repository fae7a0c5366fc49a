//! Scoped event subscriptions.
//!
//! A [`SubscriptionScope`] owns every handler it installed on the client and
//! removes them all when dropped. Replacing a scope therefore tears the old
//! handlers down before the new ones exist, as long as the old scope is
//! dropped first.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::client::{EventHandler, HandlerId, SharedClient};
use crate::events::{ClientEvent, EventName};
use crate::feed::ActivityFeed;

/// Receiver of decoded events.
pub type EventSink = Arc<dyn Fn(ClientEvent) + Send + Sync>;

/// Which event set a scope listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Dashboard: cache hits, retries and errors
    Dashboard,
    /// Activity view: every request event
    ActivityView,
}

impl ScopeKind {
    /// Events subscribed in this scope.
    pub fn events(self) -> &'static [EventName] {
        match self {
            Self::Dashboard => &[
                EventName::CacheHit,
                EventName::RequestRetry,
                EventName::RequestError,
            ],
            Self::ActivityView => &EventName::ALL,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::ActivityView => "activity-view",
        }
    }
}

/// Decode a raw delivery and forward it. Unknown names are dropped.
pub fn deliver(name: &str, payload: &Value, sink: &EventSink) {
    match ClientEvent::decode(name, payload) {
        Ok(event) => sink(event),
        Err(err) => tracing::warn!(error = %err, "dropping undecodable client event"),
    }
}

/// Sink that records every event as an activity line in `feed`.
pub fn feed_sink(feed: ActivityFeed) -> EventSink {
    Arc::new(move |event: ClientEvent| {
        feed.record(event.category(), event.activity_message());
    })
}

/// Handlers installed for one lifecycle scope.
pub struct SubscriptionScope {
    label: &'static str,
    client: SharedClient,
    handlers: Vec<(EventName, HandlerId)>,
}

impl SubscriptionScope {
    /// Subscribe `sink` to the events of `kind`.
    pub fn bind(client: SharedClient, kind: ScopeKind, sink: EventSink) -> Self {
        Self::bind_events(client, kind.label(), kind.events(), sink)
    }

    /// Subscribe `sink` to an explicit event list.
    pub fn bind_events(
        client: SharedClient,
        label: &'static str,
        events: &[EventName],
        sink: EventSink,
    ) -> Self {
        let handlers = events
            .iter()
            .map(|&name| {
                let sink = sink.clone();
                let handler: EventHandler =
                    Arc::new(move |payload: &Value| deliver(name.as_str(), payload, &sink));
                (name, client.on(name.as_str(), handler))
            })
            .collect::<Vec<_>>();
        tracing::debug!(scope = label, handlers = handlers.len(), "subscriptions bound");
        Self {
            label,
            client,
            handlers,
        }
    }

    /// Events this scope is subscribed to.
    pub fn events(&self) -> Vec<EventName> {
        self.handlers.iter().map(|(name, _)| *name).collect()
    }

    /// Unsubscribe now instead of at drop.
    pub fn close(self) {}
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        for (name, id) in self.handlers.drain(..) {
            self.client.off(name.as_str(), id);
        }
        tracing::debug!(scope = self.label, "subscriptions released");
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("label", &self.label)
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_scope_event_sets() {
        assert_eq!(
            ScopeKind::Dashboard.events(),
            &[
                EventName::CacheHit,
                EventName::RequestRetry,
                EventName::RequestError
            ]
        );
        assert_eq!(ScopeKind::ActivityView.events().len(), 4);
        assert!(!ScopeKind::Dashboard
            .events()
            .contains(&EventName::RequestStart));
    }

    #[test]
    fn test_deliver_drops_unknown_names() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: EventSink = {
            let seen = seen.clone();
            Arc::new(move |event: ClientEvent| seen.lock().push(event))
        };
        deliver("request:end", &json!({}), &sink);
        deliver("cache:hit", &json!({"junk": true}), &sink);
        assert_eq!(*seen.lock(), vec![ClientEvent::CacheHit]);
    }

    #[test]
    fn test_feed_sink_records_message() {
        let ledger = Arc::new(crate::activity::ActivityLedger::new(10));
        let sink = feed_sink(ActivityFeed::new(ledger.clone()));
        deliver("request:retry", &json!({"attempt": 2}), &sink);
        let entry = ledger.latest().unwrap();
        assert_eq!(entry.message, "Retrying request (attempt 2)");
        assert_eq!(entry.category, crate::activity::ActivityCategory::Retry);
    }
}
