//! Typed lifecycle events decoded from the client's raw payloads.
//!
//! Decoding is a single step from `(name, payload)` to a [`ClientEvent`]
//! variant. Only documented fields are read; a missing or mistyped field
//! becomes `None` and later renders as fallback text. An unknown event name
//! is the only decode failure.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::activity::ActivityCategory;
use crate::errors::DecodeError;

/// Fallback shown when a payload carries no method name.
pub const UNKNOWN_METHOD: &str = "Unknown method";
/// Fallback shown when an error payload carries no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";
/// Message recorded for every cache hit.
pub const CACHE_HIT_MESSAGE: &str = "Cache hit - response served from cache";

/// Names of the events exposed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    /// `request:start`
    RequestStart,
    /// `cache:hit`
    CacheHit,
    /// `request:retry`
    RequestRetry,
    /// `request:error`
    RequestError,
}

impl EventName {
    /// All event names in subscription order.
    pub const ALL: [EventName; 4] = [
        EventName::RequestStart,
        EventName::CacheHit,
        EventName::RequestRetry,
        EventName::RequestError,
    ];

    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestStart => "request:start",
            Self::CacheHit => "cache:hit",
            Self::RequestRetry => "request:retry",
            Self::RequestError => "request:error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownEvent { name: s.to_string() })
    }
}

/// A validated client event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A request was issued.
    RequestStart {
        /// RPC method, if the payload named one
        method: Option<String>,
    },
    /// A response was served from the client's cache.
    CacheHit,
    /// A request is being retried.
    RequestRetry {
        /// RPC method, if the payload named one
        method: Option<String>,
        /// Attempt number, if present and numeric
        attempt: Option<u64>,
    },
    /// A request failed inside the client.
    RequestError {
        /// RPC method, if the payload named one
        method: Option<String>,
        /// `error.message`, if present
        error: Option<String>,
    },
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ClientEvent {
    /// Decode an untrusted payload delivered under `name`.
    pub fn decode(name: &str, payload: &Value) -> Result<Self, DecodeError> {
        let name: EventName = name.parse()?;
        Ok(Self::decode_known(name, payload))
    }

    /// Decode a payload for an event name that is already known.
    pub fn decode_known(name: EventName, payload: &Value) -> Self {
        let method = || non_empty_str(payload.get("method"));
        match name {
            EventName::RequestStart => Self::RequestStart { method: method() },
            EventName::CacheHit => Self::CacheHit,
            EventName::RequestRetry => Self::RequestRetry {
                method: method(),
                attempt: payload.get("attempt").and_then(Value::as_u64),
            },
            EventName::RequestError => Self::RequestError {
                method: method(),
                error: non_empty_str(payload.get("error").and_then(|e| e.get("message"))),
            },
        }
    }

    /// Name the event was delivered under.
    pub fn name(&self) -> EventName {
        match self {
            Self::RequestStart { .. } => EventName::RequestStart,
            Self::CacheHit => EventName::CacheHit,
            Self::RequestRetry { .. } => EventName::RequestRetry,
            Self::RequestError { .. } => EventName::RequestError,
        }
    }

    /// Activity category the event is filed under.
    pub fn category(&self) -> ActivityCategory {
        match self {
            Self::RequestStart { .. } => ActivityCategory::Request,
            Self::CacheHit => ActivityCategory::Cache,
            Self::RequestRetry { .. } => ActivityCategory::Retry,
            Self::RequestError { .. } => ActivityCategory::Error,
        }
    }

    /// Human-readable activity line for the event.
    pub fn activity_message(&self) -> String {
        match self {
            Self::RequestStart { method } => {
                format!("Request: {}", method.as_deref().unwrap_or(UNKNOWN_METHOD))
            }
            Self::CacheHit => CACHE_HIT_MESSAGE.to_string(),
            Self::RequestRetry { attempt, .. } => match attempt {
                Some(n) => format!("Retrying request (attempt {n})"),
                None => "Retrying request (attempt ?)".to_string(),
            },
            Self::RequestError { error, .. } => {
                format!(
                    "Request failed: {}",
                    error.as_deref().unwrap_or(UNKNOWN_ERROR)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names_roundtrip_wire_names() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>(), Ok(name));
        }
        assert!(matches!(
            "request:end".parse::<EventName>(),
            Err(DecodeError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn test_request_start_with_method() {
        let ev = ClientEvent::decode("request:start", &json!({"method": "getBalance"})).unwrap();
        assert_eq!(ev.activity_message(), "Request: getBalance");
        assert_eq!(ev.category(), ActivityCategory::Request);
    }

    #[test]
    fn test_request_start_missing_method_falls_back() {
        let ev = ClientEvent::decode("request:start", &json!({})).unwrap();
        assert_eq!(ev.activity_message(), "Request: Unknown method");

        let ev = ClientEvent::decode("request:start", &json!({"method": 42})).unwrap();
        assert_eq!(ev.activity_message(), "Request: Unknown method");
    }

    #[test]
    fn test_non_object_payload_is_tolerated() {
        let ev = ClientEvent::decode("request:error", &json!("oops")).unwrap();
        assert_eq!(ev.activity_message(), "Request failed: Unknown error");

        let ev = ClientEvent::decode("cache:hit", &Value::Null).unwrap();
        assert_eq!(ev, ClientEvent::CacheHit);
    }

    #[test]
    fn test_retry_attempt() {
        let ev = ClientEvent::decode(
            "request:retry",
            &json!({"method": "getSlot", "attempt": 2}),
        )
        .unwrap();
        assert_eq!(ev.activity_message(), "Retrying request (attempt 2)");
        assert_eq!(ev.category(), ActivityCategory::Retry);

        let ev = ClientEvent::decode("request:retry", &json!({"attempt": "two"})).unwrap();
        assert_eq!(ev.activity_message(), "Retrying request (attempt ?)");
    }

    #[test]
    fn test_error_message_extraction() {
        let ev = ClientEvent::decode(
            "request:error",
            &json!({"method": "getBalance", "error": {"message": "timeout"}}),
        )
        .unwrap();
        assert_eq!(ev.activity_message(), "Request failed: timeout");

        let ev = ClientEvent::decode("request:error", &json!({"error": {}})).unwrap();
        assert_eq!(ev.activity_message(), "Request failed: Unknown error");
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = ClientEvent::decode("circuit:open", &json!({})).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownEvent {
                name: "circuit:open".to_string()
            }
        );
    }
}
