//! Callback dispatch.
//!
//! [`CallbackDispatcher`] drives a [`PartialState`] from one delivery channel and
//! invokes the handler in a fixed order: partial thinking / partial response as
//! deltas arrive, then one `on_complete_tool_call` per tool block in closure
//! order, then exactly one `on_complete_response`. Any failure produces exactly
//! one `on_error` instead, and nothing fires after a terminal callback.
//!
//! Registered [`StreamListener`]s observe the same lifecycle; a failing
//! listener never changes what the handler sees.
//!
//! The dispatcher is not thread-safe and is meant to be driven by the single
//! transport thread or task that owns the request. All methods take `&mut self`.

use super::listener::{StreamListener, notify_listeners};
use super::state::{Applied, PartialState};
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::types::{
    AssembledMessage, FinishReason, ResponseMetadata, StreamEvent, ToolExecutionRequest,
};
use std::sync::Arc;

/// Consumer-side callbacks for one streamed response.
pub trait StreamingResponseHandler {
    /// Text fragment, in arrival order.
    fn on_partial_response(&mut self, _partial: &str) {}

    /// Thinking fragment, in arrival order. Not called when thinking is not returned.
    fn on_partial_thinking(&mut self, _partial: &str) {}

    /// One completed tool call, before `on_complete_response`.
    fn on_complete_tool_call(&mut self, _request: &ToolExecutionRequest) {}

    fn on_complete_response(&mut self, message: AssembledMessage, metadata: ResponseMetadata);

    fn on_error(&mut self, error: StreamError);
}

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    NotStarted,
    Streaming,
    Completed,
    Failed,
}

impl DispatchState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Drives one request's state and guarantees at most one terminal callback.
///
/// Dropping a dispatcher that has not reached a terminal state reports
/// [`StreamError::Cancelled`], so a request is never left streaming. The
/// report is skipped while the thread is unwinding from a panic.
pub struct CallbackDispatcher<'h, H: StreamingResponseHandler + ?Sized> {
    handler: &'h mut H,
    state: PartialState,
    phase: DispatchState,
    config: StreamConfig,
    listeners: Vec<Arc<dyn StreamListener>>,
}

impl<'h, H: StreamingResponseHandler + ?Sized> CallbackDispatcher<'h, H> {
    pub fn new(handler: &'h mut H) -> Self {
        Self::with_config(handler, StreamConfig::default())
    }

    pub fn with_config(handler: &'h mut H, config: StreamConfig) -> Self {
        Self {
            handler,
            state: PartialState::with_config(&config),
            phase: DispatchState::NotStarted,
            config,
            listeners: Vec::new(),
        }
    }

    /// Register a lifecycle listener.
    pub fn with_listener(mut self, listener: Arc<dyn StreamListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Register several lifecycle listeners, in notification order.
    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn StreamListener>>) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Seed the model id reported in [`ResponseMetadata`].
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.state.model_id = Some(model_id.into());
        self
    }

    pub fn state(&self) -> DispatchState {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn partial_state(&self) -> &PartialState {
        &self.state
    }

    /// Handle one inbound event.
    pub fn on_event(&mut self, event: StreamEvent) -> DispatchState {
        if self.reject_after_terminal(event.name()) {
            return self.phase;
        }
        self.mark_started();

        match self.state.apply(event) {
            Ok(Applied::Text(text)) => self.handler.on_partial_response(&text),
            Ok(Applied::Thinking(text)) => {
                if self.config.return_thinking {
                    self.handler.on_partial_thinking(&text);
                }
            }
            Ok(Applied::MessageStop(finish_reason)) => self.complete(finish_reason),
            Ok(
                Applied::BlockOpened
                | Applied::BlockClosed
                | Applied::ToolArguments
                | Applied::Signature
                | Applied::Metadata,
            ) => {}
            Err(err) => self.fail(err),
        }
        self.phase
    }

    /// Handle the events decoded from one vendor chunk.
    ///
    /// Consecutive `BlockStop`s inside the batch close in ascending index order.
    pub fn on_batch<I>(&mut self, events: I) -> DispatchState
    where
        I: IntoIterator<Item = StreamEvent>,
    {
        let mut stops: Vec<usize> = Vec::new();
        for event in events {
            if let StreamEvent::BlockStop { index } = event {
                stops.push(index);
                continue;
            }
            self.flush_stops(&mut stops);
            self.on_event(event);
        }
        self.flush_stops(&mut stops);
        self.phase
    }

    fn flush_stops(&mut self, stops: &mut Vec<usize>) {
        if stops.is_empty() {
            return;
        }
        let batch = std::mem::take(stops);
        if self.reject_after_terminal("block_stop") {
            return;
        }
        self.mark_started();
        if let Err(err) = self.state.stop_blocks(batch) {
            self.fail(err);
        }
    }

    /// Report a transport failure (or any other error) for this request.
    pub fn on_error(&mut self, error: StreamError) -> DispatchState {
        if self.reject_after_terminal("error") {
            return self.phase;
        }
        self.fail(error);
        self.phase
    }

    /// Abandon the request; reports [`StreamError::Cancelled`] unless already terminal.
    pub fn cancel(&mut self) -> DispatchState {
        self.on_error(StreamError::Cancelled)
    }

    fn mark_started(&mut self) {
        if self.phase == DispatchState::NotStarted {
            self.phase = DispatchState::Streaming;
            let model_id = self.state.model_id.as_deref();
            notify_listeners(&self.listeners, "on_request", |l| l.on_request(model_id));
        }
    }

    fn reject_after_terminal(&self, what: &str) -> bool {
        if self.phase.is_terminal() {
            tracing::warn!(
                state = ?self.phase,
                event = what,
                "event received after terminal callback; ignoring"
            );
            return true;
        }
        false
    }

    fn complete(&mut self, finish_reason: FinishReason) {
        match self.state.assemble(finish_reason) {
            Ok((message, metadata)) => {
                self.phase = DispatchState::Completed;
                tracing::debug!(
                    tool_calls = message.tool_execution_requests.len(),
                    finish_reason = ?metadata.finish_reason,
                    "stream completed"
                );
                notify_listeners(&self.listeners, "on_response", |l| {
                    l.on_response(&message, &metadata)
                });
                for request in &message.tool_execution_requests {
                    self.handler.on_complete_tool_call(request);
                }
                self.handler.on_complete_response(message, metadata);
            }
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, error: StreamError) {
        self.mark_started();
        self.phase = DispatchState::Failed;
        tracing::debug!(error = %error, "stream failed");
        notify_listeners(&self.listeners, "on_error", |l| l.on_error(&error));
        self.handler.on_error(error);
    }
}

impl<H: StreamingResponseHandler + ?Sized> Drop for CallbackDispatcher<'_, H> {
    fn drop(&mut self) {
        if !self.phase.is_terminal() && !std::thread::panicking() {
            tracing::debug!(state = ?self.phase, "dispatcher dropped before completion");
            self.fail(StreamError::Cancelled);
        }
    }
}

impl<H: StreamingResponseHandler + ?Sized> std::fmt::Debug for CallbackDispatcher<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("phase", &self.phase)
            .field("open_blocks", &self.state.open_indices())
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use crate::types::{BlockKind, TokenUsage};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Thinking(String),
        Partial(String),
        ToolCall(ToolExecutionRequest),
        Complete(AssembledMessage, ResponseMetadata),
        Error(StreamError),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl StreamingResponseHandler for Recorder {
        fn on_partial_response(&mut self, partial: &str) {
            self.calls.push(Call::Partial(partial.to_string()));
        }
        fn on_partial_thinking(&mut self, partial: &str) {
            self.calls.push(Call::Thinking(partial.to_string()));
        }
        fn on_complete_tool_call(&mut self, request: &ToolExecutionRequest) {
            self.calls.push(Call::ToolCall(request.clone()));
        }
        fn on_complete_response(&mut self, message: AssembledMessage, metadata: ResponseMetadata) {
            self.calls.push(Call::Complete(message, metadata));
        }
        fn on_error(&mut self, error: StreamError) {
            self.calls.push(Call::Error(error));
        }
    }

    #[test]
    fn hello_scenario_fires_partials_then_complete() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            assert_eq!(d.state(), DispatchState::NotStarted);
            d.on_event(StreamEvent::block_start(0, BlockKind::Text));
            assert_eq!(d.state(), DispatchState::Streaming);
            d.on_event(StreamEvent::text(0, "Hel"));
            d.on_event(StreamEvent::text(0, "lo"));
            d.on_event(StreamEvent::block_stop(0));
            let s = d.on_event(StreamEvent::message_stop(FinishReason::Stop));
            assert_eq!(s, DispatchState::Completed);
        }
        assert_eq!(rec.calls.len(), 3);
        assert_eq!(rec.calls[0], Call::Partial("Hel".into()));
        assert_eq!(rec.calls[1], Call::Partial("lo".into()));
        match &rec.calls[2] {
            Call::Complete(msg, meta) => {
                assert_eq!(msg.text.as_deref(), Some("Hello"));
                assert_eq!(msg.thinking, None);
                assert_eq!(meta.finish_reason, FinishReason::Stop);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn tool_calls_fire_before_complete_response() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec).with_model_id("gpt-4o");
            d.on_batch(vec![
                StreamEvent::block_start(0, BlockKind::Thinking),
                StreamEvent::thinking(0, "need calc"),
                StreamEvent::block_start(1, BlockKind::tool_use("a", "calc")),
                StreamEvent::tool_arguments(1, "{\"x\":"),
                StreamEvent::block_start(2, BlockKind::tool_use("b", "calc")),
                StreamEvent::tool_arguments(2, "{}"),
                StreamEvent::tool_arguments(1, "1}"),
                StreamEvent::block_stop(2),
                StreamEvent::block_stop(0),
                StreamEvent::block_stop(1),
                StreamEvent::usage(TokenUsage::new(7, 3)),
                StreamEvent::message_stop(FinishReason::ToolExecution),
            ]);
        }
        assert_eq!(rec.calls[0], Call::Thinking("need calc".into()));
        // batch stops close 0, 1, 2 in ascending order
        assert_eq!(
            rec.calls[1],
            Call::ToolCall(ToolExecutionRequest::new("a", "calc", "{\"x\":1}"))
        );
        assert_eq!(
            rec.calls[2],
            Call::ToolCall(ToolExecutionRequest::new("b", "calc", "{}"))
        );
        match &rec.calls[3] {
            Call::Complete(msg, meta) => {
                assert_eq!(msg.tool_execution_requests.len(), 2);
                assert_eq!(meta.model_id.as_deref(), Some("gpt-4o"));
                assert_eq!(meta.token_usage, Some(TokenUsage::new(7, 3)));
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(rec.calls.len(), 4);
    }

    #[test]
    fn unknown_index_reports_single_error_and_no_partial() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            let s = d.on_event(StreamEvent::text(5, "x"));
            assert_eq!(s, DispatchState::Failed);
            d.on_event(StreamEvent::message_stop(FinishReason::Stop));
        }
        assert_eq!(
            rec.calls,
            vec![Call::Error(StreamError::violation(5, Violation::UnknownBlock))]
        );
    }

    #[test]
    fn message_stop_with_open_block_fails() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            d.on_event(StreamEvent::block_start(0, BlockKind::Text));
            d.on_event(StreamEvent::text(0, "cut"));
            d.on_event(StreamEvent::message_stop(FinishReason::Stop));
        }
        assert_eq!(rec.calls.len(), 2);
        assert_eq!(
            rec.calls[1],
            Call::Error(StreamError::IncompleteStream {
                open_indices: vec![0]
            })
        );
    }

    #[test]
    fn thinking_partials_suppressed_when_disabled() {
        let mut rec = Recorder::default();
        let config = StreamConfig::builder().return_thinking(false).build().unwrap();
        {
            let mut d = CallbackDispatcher::with_config(&mut rec, config);
            d.on_batch(vec![
                StreamEvent::block_start(0, BlockKind::Thinking),
                StreamEvent::thinking(0, "hidden"),
                StreamEvent::block_stop(0),
                StreamEvent::message_stop(FinishReason::Stop),
            ]);
        }
        assert_eq!(rec.calls.len(), 1);
        assert!(matches!(&rec.calls[0], Call::Complete(m, _) if m.thinking.is_none()));
    }

    #[test]
    fn drop_while_streaming_reports_cancelled() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            d.on_event(StreamEvent::block_start(0, BlockKind::Text));
        }
        assert_eq!(rec.calls, vec![Call::Error(StreamError::Cancelled)]);
    }

    #[test]
    fn cancel_is_terminal_and_idempotent() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            assert_eq!(d.cancel(), DispatchState::Failed);
            assert_eq!(d.cancel(), DispatchState::Failed);
        }
        assert_eq!(rec.calls, vec![Call::Error(StreamError::Cancelled)]);
    }

    #[test]
    #[traced_test]
    fn events_after_completion_are_ignored_with_warning() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            d.on_event(StreamEvent::message_stop(FinishReason::Stop));
            d.on_event(StreamEvent::message_stop(FinishReason::Stop));
            d.on_error(StreamError::transport("late"));
        }
        assert_eq!(rec.calls.len(), 1);
        assert!(matches!(&rec.calls[0], Call::Complete(m, _) if m.text.is_none()));
        assert!(logs_contain("event received after terminal callback"));
    }

    #[test]
    fn delta_to_closed_block_reports_error_without_partial() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            d.on_event(StreamEvent::block_start(0, BlockKind::Text));
            d.on_event(StreamEvent::text(0, "x"));
            d.on_event(StreamEvent::block_stop(0));
            let s = d.on_event(StreamEvent::text(0, "late"));
            assert_eq!(s, DispatchState::Failed);
        }
        assert_eq!(
            rec.calls,
            vec![
                Call::Partial("x".into()),
                Call::Error(StreamError::violation(0, Violation::BlockClosed)),
            ]
        );
    }

    #[test]
    fn usage_from_repeated_metadata_saturates() {
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec);
            d.on_event(StreamEvent::usage(TokenUsage::new(3_000_000_000, 0)));
            d.on_event(StreamEvent::usage(TokenUsage::new(3_000_000_000, 0)));
            d.on_event(StreamEvent::message_stop(FinishReason::Stop));
        }
        match &rec.calls[0] {
            Call::Complete(_, meta) => {
                let usage = meta.token_usage.as_ref().expect("usage");
                assert_eq!(usage.input_tokens, u32::MAX);
                assert_eq!(usage.total_tokens, u32::MAX);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[derive(Default)]
    struct PanicsOnPartial {
        calls: Vec<Call>,
    }

    impl StreamingResponseHandler for PanicsOnPartial {
        fn on_partial_response(&mut self, _partial: &str) {
            panic!("handler bug");
        }
        fn on_complete_response(&mut self, message: AssembledMessage, metadata: ResponseMetadata) {
            self.calls.push(Call::Complete(message, metadata));
        }
        fn on_error(&mut self, error: StreamError) {
            self.calls.push(Call::Error(error));
        }
    }

    #[test]
    fn handler_panic_does_not_report_cancelled_on_unwind() {
        let mut handler = PanicsOnPartial::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut d = CallbackDispatcher::new(&mut handler);
            d.on_event(StreamEvent::block_start(0, BlockKind::Text));
            d.on_event(StreamEvent::text(0, "boom"));
        }));
        assert!(result.is_err());
        assert!(handler.calls.is_empty());
    }

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl StreamListener for Journal {
        fn on_request(&self, model_id: Option<&str>) {
            self.entries
                .lock()
                .unwrap()
                .push(format!("request:{}", model_id.unwrap_or("-")));
        }
        fn on_response(&self, message: &AssembledMessage, _metadata: &ResponseMetadata) {
            self.entries
                .lock()
                .unwrap()
                .push(format!("response:{}", message.text.as_deref().unwrap_or("")));
        }
        fn on_error(&self, error: &StreamError) {
            self.entries.lock().unwrap().push(format!("error:{error}"));
        }
    }

    struct Faulty;

    impl StreamListener for Faulty {
        fn on_request(&self, _model_id: Option<&str>) {
            panic!("listener bug");
        }
        fn on_response(&self, _message: &AssembledMessage, _metadata: &ResponseMetadata) {
            panic!("listener bug");
        }
        fn on_error(&self, _error: &StreamError) {
            panic!("listener bug");
        }
    }

    #[test]
    #[traced_test]
    fn failing_listener_does_not_suppress_completion() {
        let journal = Arc::new(Journal::default());
        let listeners: Vec<Arc<dyn StreamListener>> = vec![Arc::new(Faulty), journal.clone()];
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec)
                .with_model_id("claude")
                .with_listeners(listeners);
            d.on_batch(vec![
                StreamEvent::block_start(0, BlockKind::Text),
                StreamEvent::text(0, "hi"),
                StreamEvent::block_stop(0),
                StreamEvent::message_stop(FinishReason::Stop),
            ]);
        }
        assert_eq!(rec.calls.len(), 2);
        assert!(matches!(&rec.calls[1], Call::Complete(m, _) if m.text.as_deref() == Some("hi")));
        assert_eq!(journal.entries(), vec!["request:claude", "response:hi"]);
        assert!(logs_contain("stream listener failed; ignoring"));
    }

    #[test]
    #[traced_test]
    fn failing_listener_does_not_suppress_error() {
        let journal = Arc::new(Journal::default());
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec)
                .with_listener(Arc::new(Faulty))
                .with_listener(journal.clone());
            d.on_event(StreamEvent::text(3, "x"));
        }
        assert_eq!(
            rec.calls,
            vec![Call::Error(StreamError::violation(3, Violation::UnknownBlock))]
        );
        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], "request:-");
        assert!(entries[1].starts_with("error:"));
        assert!(logs_contain("stream listener failed; ignoring"));
    }

    #[test]
    fn listeners_see_cancellation_of_unstarted_request() {
        let journal = Arc::new(Journal::default());
        let mut rec = Recorder::default();
        {
            let mut d = CallbackDispatcher::new(&mut rec).with_listener(journal.clone());
            d.cancel();
        }
        assert_eq!(rec.calls, vec![Call::Error(StreamError::Cancelled)]);
        assert_eq!(
            journal.entries(),
            vec!["request:-".to_string(), format!("error:{}", StreamError::Cancelled)]
        );
    }
}
