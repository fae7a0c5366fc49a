//! Scripted RPC client for deterministic tests
//!
//! `MockRpcClient` implements [`RpcClient`] entirely in memory:
//! - balance responses scripted per address, as one-shot queues or sticky defaults
//! - statistics results scripted the same way
//! - events delivered on demand with [`MockRpcClient::emit`]
//! - a request log stamped with tokio's clock, so paused-time tests can
//!   check pacing exactly
//!
//! Locks are released before handlers run or before a request sleeps.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use runic_app::{ClientError, EventHandler, HandlerId, RpcClient};
use serde_json::{json, Value};
use tokio::time::Instant;

/// One request seen by the mock.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// RPC method
    pub method: String,
    /// Parameters as sent
    pub params: Vec<Value>,
    /// When the request arrived, on tokio's clock
    pub at: Instant,
}

impl RequestRecord {
    /// First parameter as a string, which for `getBalance` is the address.
    pub fn address(&self) -> Option<&str> {
        self.params.first().and_then(Value::as_str)
    }
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<Value, ClientError>>,
    sticky: Option<Result<Value, ClientError>>,
}

impl Script {
    fn next(&mut self) -> Option<Result<Value, ClientError>> {
        self.queued.pop_front().or_else(|| self.sticky.clone())
    }
}

struct MockState {
    next_handler: u64,
    handlers: BTreeMap<String, Vec<(HandlerId, EventHandler)>>,
    responses: HashMap<String, Script>,
    default_response: Result<Value, ClientError>,
    stats: Script,
    stats_calls: usize,
    requests: Vec<RequestRecord>,
    request_delay: Duration,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_handler: 1,
            handlers: BTreeMap::new(),
            responses: HashMap::new(),
            default_response: Ok(json!({ "context": { "slot": 1 }, "value": 0 })),
            stats: Script {
                queued: VecDeque::new(),
                sticky: Some(Ok(json!({}))),
            },
            stats_calls: 0,
            requests: Vec::new(),
            request_delay: Duration::ZERO,
        }
    }
}

/// In-memory [`RpcClient`] with scripted behaviour.
#[derive(Clone, Default)]
pub struct MockRpcClient {
    state: Arc<Mutex<MockState>>,
}

impl MockRpcClient {
    /// Client answering every balance request with zero lamports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle usable as a `SharedClient`.
    pub fn shared(&self) -> Arc<dyn RpcClient> {
        Arc::new(self.clone())
    }

    /// Always answer requests for `address` with `result`.
    pub fn respond(&self, address: &str, result: Result<Value, ClientError>) -> &Self {
        self.state
            .lock()
            .responses
            .entry(address.to_string())
            .or_default()
            .sticky = Some(result);
        self
    }

    /// Answer the next request for `address` with `result`, ahead of any sticky answer.
    pub fn respond_once(&self, address: &str, result: Result<Value, ClientError>) -> &Self {
        self.state
            .lock()
            .responses
            .entry(address.to_string())
            .or_default()
            .queued
            .push_back(result);
        self
    }

    /// Always answer `address` with a balance of `lamports`.
    pub fn set_balance(&self, address: &str, lamports: u64) -> &Self {
        self.respond(address, Ok(json!({ "context": { "slot": 1 }, "value": lamports })))
    }

    /// Always fail requests for `address` with `message`.
    pub fn fail(&self, address: &str, message: &str) -> &Self {
        self.respond(address, Err(ClientError::request(message)))
    }

    /// Answer for addresses without a script.
    pub fn set_default_response(&self, result: Result<Value, ClientError>) -> &Self {
        self.state.lock().default_response = result;
        self
    }

    /// Delay every request by `delay`, on tokio's clock.
    pub fn set_request_delay(&self, delay: Duration) -> &Self {
        self.state.lock().request_delay = delay;
        self
    }

    /// Return `result` from every stats call until changed.
    pub fn set_stats(&self, result: Result<Value, ClientError>) -> &Self {
        self.state.lock().stats.sticky = Some(result);
        self
    }

    /// Return `result` from the next stats call only.
    pub fn push_stats(&self, result: Result<Value, ClientError>) -> &Self {
        self.state.lock().stats.queued.push_back(result);
        self
    }

    /// Deliver `payload` to every handler subscribed to `event`.
    ///
    /// Returns how many handlers ran.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let handlers: Vec<EventHandler> = self
            .state
            .lock()
            .handlers
            .get(event)
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(&payload);
        }
        handlers.len()
    }

    /// Handlers currently subscribed to `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.state.lock().handlers.get(event).map_or(0, Vec::len)
    }

    /// Handlers across all events.
    pub fn total_handlers(&self) -> usize {
        self.state.lock().handlers.values().map(Vec::len).sum()
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.state.lock().requests.clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of stats calls seen so far.
    pub fn stats_calls(&self) -> usize {
        self.state.lock().stats_calls
    }
}

#[async_trait]
impl RpcClient for MockRpcClient {
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
        let mut state = self.state.lock();
        if let Some(handlers) = state.handlers.get_mut(event) {
            handlers.retain(|(hid, _)| *hid != id);
            if handlers.is_empty() {
                state.handlers.remove(event);
            }
        }
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let (delay, result) = {
            let mut state = self.state.lock();
            let address = params
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            state.requests.push(RequestRecord {
                method: method.to_string(),
                params,
                at: Instant::now(),
            });
            let scripted = state.responses.get_mut(&address).and_then(Script::next);
            let result = scripted.unwrap_or_else(|| state.default_response.clone());
            (state.request_delay, result)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn stats(&self) -> Result<Value, ClientError> {
        let mut state = self.state.lock();
        state.stats_calls += 1;
        state.stats.next().unwrap_or_else(|| Ok(json!({})))
    }
}
