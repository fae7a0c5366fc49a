//! Simulated load balancer
//!
//! A scripted stand-in for the real runicRPC client so the monitor can run
//! without network access. Each request draws its fate from a seeded RNG:
//! served from cache, answered by an endpoint, or failed (some as HTTP 403).
//! The matching lifecycle events are emitted along the way. Nothing is
//! actually routed, cached or retried; the statistics only count what was
//! scripted and label each endpoint's circuit from its error ratio.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for the simulation state. The lock is never
//! held across `.await` and is released before event handlers run.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runic_app::config::ClientSettings;
use runic_app::fetch::GET_BALANCE_METHOD;
use runic_app::format::LAMPORTS_PER_SOL;
use runic_app::{CircuitState, ClientError, EventHandler, EventName, HandlerId, RpcClient};
use serde_json::{json, Value};

/// Error ratio at which an endpoint is reported open.
const OPEN_ERROR_RATIO: f64 = 0.5;
/// Error ratio at which an endpoint is reported half-open.
const HALF_OPEN_ERROR_RATIO: f64 = 0.2;

/// Knobs for the scripted traffic.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Probability that a request fails
    pub failure_rate: f64,
    /// Share of failures that are public-endpoint throttling (HTTP 403)
    pub rate_limit_share: f64,
    /// Probability that a successful request is reported as a cache hit
    pub cache_hit_share: f64,
    /// RNG seed; random when absent
    pub seed: Option<u64>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            failure_rate: 0.1,
            rate_limit_share: 0.5,
            cache_hit_share: 0.2,
            seed: None,
        }
    }
}

#[derive(Debug)]
struct Endpoint {
    name: &'static str,
    base_latency_ms: u64,
    requests: u64,
    errors: u64,
    latencies: Vec<f64>,
}

impl Endpoint {
    fn new(name: &'static str, base_latency_ms: u64) -> Self {
        Self {
            name,
            base_latency_ms,
            requests: 0,
            errors: 0,
            latencies: Vec::new(),
        }
    }

    fn circuit(&self) -> CircuitState {
        if self.requests == 0 {
            return CircuitState::Closed;
        }
        let ratio = self.errors as f64 / self.requests as f64;
        if ratio >= OPEN_ERROR_RATIO {
            CircuitState::Open
        } else if ratio >= HALF_OPEN_ERROR_RATIO {
            CircuitState::HalfOpen
        } else {
            CircuitState::Closed
        }
    }

    fn to_json(&self) -> Value {
        let mut sorted = self.latencies.clone();
        sorted.sort_by(f64::total_cmp);
        let pick = |p: f64| -> f64 {
            if sorted.is_empty() {
                0.0
            } else {
                sorted[((sorted.len() - 1) as f64 * p).round() as usize]
            }
        };
        let avg = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        json!({
            "name": self.name,
            "requests": self.requests,
            "errors": self.errors,
            "latency": {
                "min": pick(0.0),
                "max": pick(1.0),
                "avg": avg,
                "p50": pick(0.5),
                "p95": pick(0.95),
                "p99": pick(0.99),
            },
            "circuitState": self.circuit().label(),
        })
    }
}

/// What one request will do, drawn under the lock.
enum Script {
    CacheHit,
    Served { latency: Duration },
    Failed { endpoint: &'static str, latency: Duration, message: String },
}

struct SimState {
    rng: StdRng,
    endpoints: Vec<Endpoint>,
    total_requests: u64,
    total_errors: u64,
    cache_hits: u64,
    next_handler: u64,
    handlers: HashMap<String, Vec<(HandlerId, EventHandler)>>,
}

/// Scripted client used by the terminal host.
pub struct SimulatedClient {
    options: SimOptions,
    state: Mutex<SimState>,
}

impl SimulatedClient {
    /// Name the endpoints after the configured providers.
    pub fn new(settings: ClientSettings, options: SimOptions) -> Self {
        let mut endpoints = Vec::new();
        if settings.api_keys.helius.is_some() {
            endpoints.push(Endpoint::new("helius", 80));
        }
        if settings.api_keys.alchemy.is_some() {
            endpoints.push(Endpoint::new("alchemy", 110));
        }
        if endpoints.is_empty() || settings.use_fallback {
            endpoints.push(Endpoint::new("public", 250));
        }

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            options,
            state: Mutex::new(SimState {
                rng,
                endpoints,
                total_requests: 0,
                total_errors: 0,
                cache_hits: 0,
                next_handler: 1,
                handlers: HashMap::new(),
            }),
        }
    }

    fn emit(&self, event: EventName, payload: Value) {
        let handlers: Vec<EventHandler> = self
            .state
            .lock()
            .handlers
            .get(event.as_str())
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(&payload);
        }
    }

    fn draw(&self) -> Script {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.total_requests += 1;

        let endpoint = state.rng.gen_range(0..state.endpoints.len());
        let base = state.endpoints[endpoint].base_latency_ms as f64;
        let latency_ms = (base * state.rng.gen_range(0.6..1.8)).max(1.0);
        let latency = Duration::from_millis(latency_ms as u64);

        if state.rng.gen::<f64>() < self.options.failure_rate {
            let message = if state.rng.gen::<f64>() < self.options.rate_limit_share {
                "HTTP 403 Forbidden: public endpoint rate limit".to_string()
            } else {
                format!("HTTP 503 Service Unavailable from {}", state.endpoints[endpoint].name)
            };
            let slot = &mut state.endpoints[endpoint];
            slot.requests += 1;
            slot.errors += 1;
            slot.latencies.push(latency_ms);
            state.total_errors += 1;
            return Script::Failed {
                endpoint: slot.name,
                latency,
                message,
            };
        }
        if state.rng.gen::<f64>() < self.options.cache_hit_share {
            state.cache_hits += 1;
            return Script::CacheHit;
        }
        let slot = &mut state.endpoints[endpoint];
        slot.requests += 1;
        slot.latencies.push(latency_ms);
        Script::Served { latency }
    }

    fn respond(&self, method: &str, params: &[Value]) -> Value {
        let mut state = self.state.lock();
        let slot = 250_000_000u64 + state.total_requests;
        if method == GET_BALANCE_METHOD {
            let address = params.first().and_then(Value::as_str).unwrap_or_default();
            let seed = address
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
            let drift = state.rng.gen_range(0..LAMPORTS_PER_SOL / 100);
            let lamports = (seed % 5_000) * LAMPORTS_PER_SOL + seed % LAMPORTS_PER_SOL + drift;
            json!({ "context": { "slot": slot }, "value": lamports })
        } else {
            json!(slot)
        }
    }
}

#[async_trait]
impl RpcClient for SimulatedClient {
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        let mut state = self.state.lock();
        let id = HandlerId(state.next_handler);
        state.next_handler += 1;
        state
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn off(&self, event: &str, id: HandlerId) {
        if let Some(handlers) = self.state.lock().handlers.get_mut(event) {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        self.emit(EventName::RequestStart, json!({ "method": method }));

        match self.draw() {
            Script::CacheHit => {
                self.emit(EventName::CacheHit, json!({ "method": method }));
                Ok(self.respond(method, &params))
            }
            Script::Served { latency } => {
                tokio::time::sleep(latency).await;
                Ok(self.respond(method, &params))
            }
            Script::Failed {
                endpoint,
                latency,
                message,
            } => {
                tokio::time::sleep(latency).await;
                // Throttling is reported straight away; other failures show
                // one scripted retry first.
                if !message.contains("403") {
                    self.emit(
                        EventName::RequestRetry,
                        json!({ "method": method, "attempt": 1, "endpoint": endpoint }),
                    );
                }
                self.emit(
                    EventName::RequestError,
                    json!({ "method": method, "error": { "message": message } }),
                );
                Err(ClientError::request(message))
            }
        }
    }

    fn stats(&self) -> Result<Value, ClientError> {
        let state = self.state.lock();
        let cache_hit_rate = if state.total_requests == 0 {
            0.0
        } else {
            state.cache_hits as f64 / state.total_requests as f64
        };
        Ok(json!({
            "totalRequests": state.total_requests,
            "totalErrors": state.total_errors,
            "cacheHitRate": cache_hit_rate,
            "endpoints": state.endpoints.iter().map(Endpoint::to_json).collect::<Vec<_>>(),
        }))
    }
}
