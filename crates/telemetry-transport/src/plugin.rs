//! # Plugin Pipeline
//!
//! Interceptors that see every outgoing payload before it is sent and every
//! response after it arrives.
//!
//! A plugin may rewrite a payload or veto it by returning `None` from
//! [`Plugin::on_before_send`]. Plugins run in registration order and the
//! first veto stops the chain for that payload.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::response::TransportResponse;

/// Interceptor for outgoing payloads and incoming responses
///
/// Both hooks have pass-through defaults, so implementors override only what
/// they need.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use telemetry_transport::Plugin;
///
/// struct DropHeartbeats;
///
/// #[async_trait]
/// impl Plugin for DropHeartbeats {
///     fn name(&self) -> &str {
///         "drop-heartbeats"
///     }
///
///     async fn on_before_send(&self, payload: Value) -> Option<Value> {
///         if payload.get("type").and_then(Value::as_str) == Some("heartbeat") {
///             None
///         } else {
///             Some(payload)
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Transform a payload, or return `None` to filter it out
    async fn on_before_send(&self, payload: Value) -> Option<Value> {
        Some(payload)
    }

    /// Observe the response of a delivery attempt
    async fn on_after_send(&self, _response: &TransportResponse) {}
}

/// Ordered set of registered plugins
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; it runs after every plugin registered before it
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "Registered transport plugin");
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run `payload` through every plugin; `None` means it was vetoed
    pub async fn before_send(&self, payload: Value) -> Option<Value> {
        let mut current = payload;
        for plugin in &self.plugins {
            match plugin.on_before_send(current).await {
                Some(next) => current = next,
                None => {
                    debug!(plugin = plugin.name(), "Payload filtered by plugin");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Run each payload through the pipeline, keeping the ones not vetoed
    ///
    /// Returns the surviving payloads and the number filtered out.
    pub async fn before_send_all(&self, payloads: Vec<Value>) -> (Vec<Value>, usize) {
        let total = payloads.len();
        let mut kept = Vec::with_capacity(total);
        for payload in payloads {
            if let Some(payload) = self.before_send(payload).await {
                kept.push(payload);
            }
        }
        let filtered = total - kept.len();
        (kept, filtered)
    }

    /// Let every plugin observe a response
    pub async fn after_send(&self, response: &TransportResponse) {
        for plugin in &self.plugins {
            plugin.on_after_send(response).await;
        }
    }
}

impl std::fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
