//! Boundary to the external load-balancing RPC client.
//!
//! The routing, caching, retry and circuit-breaker engine lives outside this
//! crate. The core only needs three things from it: named event
//! subscriptions, a one-shot statistics accessor, and a fallible request
//! method. Everything crossing this boundary is raw JSON and is treated as
//! untrusted until decoded (see [`crate::events`] and [`crate::stats`]).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ClientError;

/// Callback invoked with the raw payload of a subscribed event.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifier returned by [`RpcClient::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

/// The load balancer as seen by the controller.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Subscribe `handler` to the event called `event`.
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId;

    /// Remove a handler previously installed with [`RpcClient::on`].
    ///
    /// Removing an unknown id is a no-op.
    fn off(&self, event: &str, id: HandlerId);

    /// Execute one RPC request through the balancer.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError>;

    /// Take a statistics snapshot. Synchronous and may fail.
    fn stats(&self) -> Result<Value, ClientError>;
}

/// Shared handle to the client used across the session.
pub type SharedClient = Arc<dyn RpcClient>;
