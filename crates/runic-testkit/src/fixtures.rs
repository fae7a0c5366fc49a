//! Common fixtures for controller tests.

use runic_app::{demo_wallets, ClientError, MonitorConfig, TrackedWallet};
use serde_json::{json, Value};

/// Addresses of the default demo wallets, in tracking order.
pub fn demo_addresses() -> Vec<String> {
    demo_wallets().into_iter().map(|w| w.address).collect()
}

/// Default configuration tracking the given wallets.
pub fn config_with_wallets(wallets: Vec<TrackedWallet>) -> MonitorConfig {
    MonitorConfig {
        wallets,
        ..MonitorConfig::default()
    }
}

/// Default configuration tracking the first `n` demo wallets.
pub fn config_with_demo_wallets(n: usize) -> MonitorConfig {
    config_with_wallets(demo_wallets().into_iter().take(n).collect())
}

/// A `getBalance` success payload.
pub fn balance_response(lamports: u64) -> Result<Value, ClientError> {
    Ok(json!({ "context": { "slot": 1 }, "value": lamports }))
}

/// The failure public endpoints return when throttling.
pub fn forbidden() -> ClientError {
    ClientError::request("HTTP 403 Forbidden: rate limit exceeded")
}

/// A statistics payload with one endpoint per `(name, avg_latency_ms, circuit)`.
pub fn stats_payload(
    total_requests: u64,
    total_errors: u64,
    cache_hit_rate: f64,
    endpoints: &[(&str, f64, &str)],
) -> Value {
    let endpoints: Vec<Value> = endpoints
        .iter()
        .map(|(name, avg, circuit)| {
            json!({
                "name": name,
                "requests": total_requests,
                "errors": total_errors,
                "latency": { "avg": avg, "p50": avg, "p95": avg * 2.0 },
                "circuitState": circuit,
            })
        })
        .collect();
    json!({
        "totalRequests": total_requests,
        "totalErrors": total_errors,
        "cacheHitRate": cache_hit_rate,
        "endpoints": endpoints,
    })
}
