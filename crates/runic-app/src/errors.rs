//! Error types for the controller core
//!
//! Each concern gets its own `thiserror` enum. None of these errors is fatal
//! to the session: the worst observable outcome of any of them is a stale or
//! missing balance/statistic plus a visible error entry.

use std::fmt;

/// Failure reported by the external RPC client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// A request through the load balancer was rejected.
    #[error("{message}")]
    Request {
        /// Message as reported by the client
        message: String,
    },

    /// The statistics accessor threw.
    #[error("stats unavailable: {message}")]
    Stats {
        /// Message as reported by the client
        message: String,
    },

    /// The client produced a value the core could not interpret.
    #[error("malformed response: {message}")]
    Malformed {
        /// Description of the shape problem
        message: String,
    },
}

impl ClientError {
    /// Create a request error
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Create a stats accessor error
    pub fn stats(message: impl Into<String>) -> Self {
        Self::Stats {
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// The raw message carried by the error.
    pub fn message(&self) -> &str {
        match self {
            Self::Request { message } | Self::Stats { message } | Self::Malformed { message } => {
                message
            }
        }
    }
}

/// Classification of a failed balance fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Public endpoint throttling (HTTP 403). Expected, kept out of diagnostics.
    RateLimited,
    /// Any other failure.
    Request,
}

impl FailureKind {
    /// Classify a client error by its message.
    pub fn classify(error: &ClientError) -> Self {
        if error.message().contains("403") {
            Self::RateLimited
        } else {
            Self::Request
        }
    }

    /// Whether failures of this kind go to the diagnostic channel.
    pub fn is_diagnostic(self) -> bool {
        matches!(self, Self::Request)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Request => write!(f, "request failed"),
        }
    }
}

/// Failure to turn an untrusted event into a typed [`crate::events::ClientEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The event name is not one the core subscribes to.
    #[error("unknown event name: {name}")]
    UnknownEvent {
        /// Name as delivered by the client
        name: String,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that could not be read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The TOML did not parse.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The effective config could not be rendered back to TOML.
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value was outside its accepted range or set.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by controller operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// The RPC client failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A registered refetch routine failed.
    #[error("refetch failed: {message}")]
    Refetch {
        /// Description of the failure
        message: String,
    },
}

impl AppError {
    /// Create a refetch error
    pub fn refetch(message: impl Into<String>) -> Self {
        Self::Refetch {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_403_is_rate_limited() {
        let err = ClientError::request("HTTP 403: Forbidden");
        assert_eq!(FailureKind::classify(&err), FailureKind::RateLimited);
        assert!(!FailureKind::RateLimited.is_diagnostic());
    }

    #[test]
    fn test_other_failures_are_diagnostic() {
        let err = ClientError::request("connection reset");
        assert_eq!(FailureKind::classify(&err), FailureKind::Request);
        assert!(FailureKind::Request.is_diagnostic());
    }

    #[test]
    fn test_message_passthrough() {
        assert_eq!(ClientError::stats("boom").message(), "boom");
        assert_eq!(ClientError::stats("boom").to_string(), "stats unavailable: boom");
        assert_eq!(ClientError::request("x").to_string(), "x");
    }
}
