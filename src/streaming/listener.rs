//! Stream listeners
//!
//! Listeners observe the lifecycle of a streamed request without taking part
//! in it: `on_request` when the dispatcher starts, then exactly one of
//! `on_response` or `on_error`. Hooks are best-effort. A listener that panics
//! is logged and skipped; the handler and the remaining listeners still run.

use crate::error::StreamError;
use crate::types::{AssembledMessage, ResponseMetadata};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Observer of one streamed request's lifecycle.
pub trait StreamListener: Send + Sync {
    /// Called once when the first event (or an early error) reaches the dispatcher.
    fn on_request(&self, _model_id: Option<&str>) {}

    /// Called when the response assembled successfully.
    fn on_response(&self, _message: &AssembledMessage, _metadata: &ResponseMetadata) {}

    /// Called when the request failed or was cancelled.
    fn on_error(&self, _error: &StreamError) {}
}

/// A simple logging listener backed by `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingListener;

impl StreamListener for LoggingListener {
    fn on_request(&self, model_id: Option<&str>) {
        tracing::debug!(model = ?model_id, "stream started");
    }

    fn on_response(&self, message: &AssembledMessage, metadata: &ResponseMetadata) {
        tracing::debug!(
            finish_reason = ?metadata.finish_reason,
            tool_calls = message.tool_execution_requests.len(),
            usage = ?metadata.token_usage,
            "stream response"
        );
    }

    fn on_error(&self, error: &StreamError) {
        tracing::debug!(err = %error, "stream error");
    }
}

/// Run `hook` on every listener, isolating panics.
pub(crate) fn notify_listeners<F>(listeners: &[Arc<dyn StreamListener>], hook: &'static str, f: F)
where
    F: Fn(&dyn StreamListener),
{
    for (position, listener) in listeners.iter().enumerate() {
        if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
            tracing::warn!(hook, listener = position, "stream listener failed; ignoring");
        }
    }
}
