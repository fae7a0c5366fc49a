//! Statistics snapshot decoded from the client's accessor.
//!
//! Every field is optional on the wire. A value that does not fit the shape
//! at all is a decode failure; the poller treats it like an accessor error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ClientError;

/// Per-endpoint circuit breaker state. Display only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    #[default]
    Closed,
    /// Failing, requests short-circuited
    Open,
    /// Probing for recovery
    HalfOpen,
}

impl CircuitState {
    /// Wire label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Direction indicator for a summary card.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
    /// Good
    Up,
    /// Bad
    Down,
    /// Neither
    Neutral,
}

impl Trend {
    /// Arrow glyph.
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Neutral => "—",
        }
    }
}

/// Latency distribution in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyStats {
    /// Fastest
    pub min: Option<f64>,
    /// Slowest
    pub max: Option<f64>,
    /// Mean
    pub avg: Option<f64>,
    /// Median
    pub p50: Option<f64>,
    /// 95th percentile
    pub p95: Option<f64>,
    /// 99th percentile
    pub p99: Option<f64>,
}

/// Per-endpoint statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointStats {
    /// Endpoint name
    pub name: String,
    /// Requests routed to the endpoint
    pub requests: Option<u64>,
    /// Failed requests
    pub errors: Option<u64>,
    /// Latency distribution
    pub latency: Option<LatencyStats>,
    /// Circuit breaker state
    pub circuit_state: Option<CircuitState>,
}

impl EndpointStats {
    /// Circuit state, `CLOSED` when not reported.
    pub fn circuit(&self) -> CircuitState {
        self.circuit_state.unwrap_or_default()
    }

    /// Healthy unless the circuit is open.
    pub fn is_healthy(&self) -> bool {
        self.circuit() != CircuitState::Open
    }

    /// Mean latency in ms, 0 when not reported.
    pub fn avg_latency_ms(&self) -> f64 {
        self.latency.as_ref().and_then(|l| l.avg).unwrap_or(0.0)
    }

    /// Error rate as a one-decimal percentage string.
    pub fn error_rate_percent(&self) -> String {
        let requests = self.requests.unwrap_or(0);
        if requests == 0 {
            return "0.0".to_string();
        }
        let errors = self.errors.unwrap_or(0);
        format!("{:.1}", errors as f64 / requests as f64 * 100.0)
    }
}

/// Snapshot of the client's counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Requests seen by the client
    pub total_requests: Option<u64>,
    /// Failed requests
    pub total_errors: Option<u64>,
    /// Fraction of requests served from cache, 0..=1
    pub cache_hit_rate: Option<f64>,
    /// Per-endpoint breakdown
    pub endpoints: Option<Vec<EndpointStats>>,
}

/// Latency below this trends up.
const FAST_LATENCY_MS: f64 = 200.0;
/// Latency below this (and not fast) is neutral.
const SLOW_LATENCY_MS: f64 = 500.0;
/// Hit rate above this trends up.
const GOOD_CACHE_HIT_RATE: f64 = 0.5;

impl StatsSnapshot {
    /// Decode the accessor's raw value.
    pub fn decode(raw: Value) -> Result<Self, ClientError> {
        serde_json::from_value(raw).map_err(|e| ClientError::malformed(e.to_string()))
    }

    /// Endpoints, empty when not reported.
    pub fn endpoints(&self) -> &[EndpointStats] {
        self.endpoints.as_deref().unwrap_or_default()
    }

    /// Mean of per-endpoint average latencies, 0 without endpoints.
    pub fn average_latency_ms(&self) -> f64 {
        let endpoints = self.endpoints();
        if endpoints.is_empty() {
            return 0.0;
        }
        endpoints.iter().map(EndpointStats::avg_latency_ms).sum::<f64>() / endpoints.len() as f64
    }

    /// Cache hit rate as a one-decimal percentage string.
    pub fn cache_hit_percent(&self) -> String {
        format!("{:.1}", self.cache_hit_rate.unwrap_or(0.0) * 100.0)
    }

    /// Requests card trend: down once any error was seen.
    pub fn request_trend(&self) -> Trend {
        if self.total_errors.unwrap_or(0) > 0 {
            Trend::Down
        } else {
            Trend::Up
        }
    }

    /// Latency card trend.
    pub fn latency_trend(&self) -> Trend {
        let avg = self.average_latency_ms();
        if avg < FAST_LATENCY_MS {
            Trend::Up
        } else if avg < SLOW_LATENCY_MS {
            Trend::Neutral
        } else {
            Trend::Down
        }
    }

    /// Cache card trend.
    pub fn cache_trend(&self) -> Trend {
        if self.cache_hit_rate.unwrap_or(0.0) > GOOD_CACHE_HIT_RATE {
            Trend::Up
        } else {
            Trend::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_snapshot() {
        let raw = json!({
            "totalRequests": 120,
            "totalErrors": 3,
            "cacheHitRate": 0.625,
            "endpoints": [
                {
                    "name": "helius",
                    "requests": 80,
                    "errors": 2,
                    "latency": {"min": 40, "max": 300, "avg": 120.5, "p50": 100, "p95": 250, "p99": 290},
                    "circuitState": "CLOSED"
                },
                {"name": "public", "requests": 40, "errors": 1, "circuitState": "HALF_OPEN"}
            ]
        });
        let snapshot = StatsSnapshot::decode(raw).unwrap();
        assert_eq!(snapshot.total_requests, Some(120));
        assert_eq!(snapshot.endpoints().len(), 2);
        assert_eq!(snapshot.endpoints()[1].circuit(), CircuitState::HalfOpen);
        assert_eq!(snapshot.cache_hit_percent(), "62.5");
        assert_eq!(snapshot.cache_trend(), Trend::Up);
        assert_eq!(snapshot.request_trend(), Trend::Down);
    }

    #[test]
    fn test_decode_empty_object() {
        let snapshot = StatsSnapshot::decode(json!({})).unwrap();
        assert_eq!(snapshot, StatsSnapshot::default());
        assert_eq!(snapshot.average_latency_ms(), 0.0);
        assert_eq!(snapshot.cache_hit_percent(), "0.0");
        assert_eq!(snapshot.request_trend(), Trend::Up);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(matches!(
            StatsSnapshot::decode(json!({"totalRequests": "many"})),
            Err(ClientError::Malformed { .. })
        ));
        assert!(StatsSnapshot::decode(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_average_latency_treats_missing_as_zero() {
        let snapshot = StatsSnapshot {
            endpoints: Some(vec![
                EndpointStats {
                    name: "a".into(),
                    latency: Some(LatencyStats {
                        avg: Some(300.0),
                        ..LatencyStats::default()
                    }),
                    ..EndpointStats::default()
                },
                EndpointStats {
                    name: "b".into(),
                    ..EndpointStats::default()
                },
            ]),
            ..StatsSnapshot::default()
        };
        assert_eq!(snapshot.average_latency_ms(), 150.0);
        assert_eq!(snapshot.latency_trend(), Trend::Up);
    }

    #[test]
    fn test_latency_trend_thresholds() {
        let with_avg = |avg: f64| StatsSnapshot {
            endpoints: Some(vec![EndpointStats {
                name: "x".into(),
                latency: Some(LatencyStats {
                    avg: Some(avg),
                    ..LatencyStats::default()
                }),
                ..EndpointStats::default()
            }]),
            ..StatsSnapshot::default()
        };
        assert_eq!(with_avg(199.0).latency_trend(), Trend::Up);
        assert_eq!(with_avg(200.0).latency_trend(), Trend::Neutral);
        assert_eq!(with_avg(500.0).latency_trend(), Trend::Down);
    }

    #[test]
    fn test_endpoint_health_and_error_rate() {
        let open = EndpointStats {
            name: "down".into(),
            requests: Some(8),
            errors: Some(1),
            circuit_state: Some(CircuitState::Open),
            ..EndpointStats::default()
        };
        assert!(!open.is_healthy());
        assert_eq!(open.error_rate_percent(), "12.5");

        let idle = EndpointStats::default();
        assert!(idle.is_healthy());
        assert_eq!(idle.circuit(), CircuitState::Closed);
        assert_eq!(idle.error_rate_percent(), "0.0");
    }
}
