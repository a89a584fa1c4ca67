//! Request/response topics served by the coordinator.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

type Handler = Arc<dyn Fn(&[Value]) -> CoreResult<Value> + Send + Sync>;

/// Topic to handler table.
#[derive(Clone, Default)]
pub struct RpcRouter {
    handlers: BTreeMap<String, Handler>,
}

impl RpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`, replacing any earlier one.
    pub fn register<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> CoreResult<Value> + Send + Sync + 'static,
    {
        let topic = topic.into();
        if self.handlers.insert(topic.clone(), Arc::new(handler)).is_some() {
            warn!("rpc handler for '{}' replaced", topic);
        }
    }

    /// Invokes the handler for `topic`.
    ///
    /// # Errors
    /// `UnknownTopic` when nothing is registered, otherwise whatever the
    /// handler returns.
    pub fn call(&self, topic: &str, args: &[Value]) -> CoreResult<Value> {
        let handler = self
            .handlers
            .get(topic)
            .ok_or_else(|| CoreError::UnknownTopic(topic.to_string()))?;
        debug!("rpc {} ({} args)", topic, args.len());
        handler(args)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Reads argument `index` as a string.
pub fn string_arg<'a>(topic: &str, args: &'a [Value], index: usize) -> CoreResult<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::invalid_argument(topic, format!("argument {} must be a string", index)))
}

/// Reads argument `index` as a number.
pub fn number_arg(topic: &str, args: &[Value], index: usize) -> CoreResult<f64> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| CoreError::invalid_argument(topic, format!("argument {} must be a number", index)))
}
