//! Azure OpenAI chat-completions stream decoding (SSE).

use crate::error::StreamError;
use crate::streaming::JsonEventConverter;
use crate::types::{BlockKind, FinishReason, StreamEvent, TokenUsage};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Deserialize)]
struct AzureStreamChunk {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<AzureStreamChoice>,
    usage: Option<AzureStreamUsage>,
}

#[derive(Debug, Deserialize)]
struct AzureStreamChoice {
    delta: Option<AzureStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureStreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<AzureToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct AzureToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<AzureFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct AzureFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureStreamUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
    prompt_tokens_details: Option<AzurePromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct AzurePromptTokensDetails {
    cached_tokens: Option<u32>,
}

/// Map an OpenAI `finish_reason` onto [`FinishReason`].
pub fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolExecution,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Converts chat completion chunks into [`StreamEvent`]s.
///
/// The wire format has no block boundaries. Block indices are handed out in
/// arrival order: one for reasoning, one for content and one per tool call.
/// A `finish_reason` closes every open block in ascending index order; the
/// `MessageStop` is held back for the trailing usage chunk (or end of stream).
#[derive(Debug, Default)]
pub struct AzureOpenAiEventConverter {
    next_index: usize,
    thinking_block: Option<usize>,
    text_block: Option<usize>,
    tool_blocks: BTreeMap<usize, usize>,
    open: BTreeSet<usize>,
    model_reported: bool,
    pending_stop: Option<FinishReason>,
}

impl AzureOpenAiEventConverter {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: BlockKind, out: &mut Vec<StreamEvent>) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.open.insert(index);
        tracing::debug!(index, kind = kind.label(), "azure block opened");
        out.push(StreamEvent::block_start(index, kind));
        index
    }

    fn thinking_index(&mut self, out: &mut Vec<StreamEvent>) -> usize {
        match self.thinking_block {
            Some(index) => index,
            None => {
                let index = self.allocate(BlockKind::Thinking, out);
                self.thinking_block = Some(index);
                index
            }
        }
    }

    fn text_index(&mut self, out: &mut Vec<StreamEvent>) -> usize {
        match self.text_block {
            Some(index) => index,
            None => {
                let index = self.allocate(BlockKind::Text, out);
                self.text_block = Some(index);
                index
            }
        }
    }

    fn apply_tool_call(&mut self, call: AzureToolCallDelta, out: &mut Vec<StreamEvent>) {
        let (name, arguments) = match call.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        let index = match self.tool_blocks.get(&call.index) {
            Some(index) => *index,
            None => {
                let kind = BlockKind::tool_use(
                    call.id.unwrap_or_default(),
                    name.unwrap_or_default(),
                );
                let index = self.allocate(kind, out);
                self.tool_blocks.insert(call.index, index);
                index
            }
        };
        if let Some(arguments) = arguments
            && !arguments.is_empty()
        {
            out.push(StreamEvent::tool_arguments(index, arguments));
        }
    }

    fn close_open_blocks(&mut self, out: &mut Vec<StreamEvent>) {
        // BTreeSet iterates ascending.
        for index in std::mem::take(&mut self.open) {
            out.push(StreamEvent::block_stop(index));
        }
    }

    /// Release the held-back `MessageStop`, if any.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.pending_stop.take().map(StreamEvent::message_stop)
    }
}

impl JsonEventConverter for AzureOpenAiEventConverter {
    fn convert_json(&mut self, json_data: &str) -> Result<Vec<StreamEvent>, StreamError> {
        let chunk: AzureStreamChunk = serde_json::from_str(json_data)?;
        let mut out = Vec::new();

        if !self.model_reported
            && let Some(model) = chunk.model.filter(|m| !m.is_empty())
        {
            self.model_reported = true;
            out.push(StreamEvent::Metadata {
                usage: None,
                model_id: Some(model),
            });
        }

        // Only the first choice is assembled.
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(delta) = choice.delta {
                if let Some(text) = delta.reasoning_content.filter(|t| !t.is_empty()) {
                    let index = self.thinking_index(&mut out);
                    out.push(StreamEvent::thinking(index, text));
                }
                if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                    let index = self.text_index(&mut out);
                    out.push(StreamEvent::text(index, text));
                }
                for call in delta.tool_calls {
                    self.apply_tool_call(call, &mut out);
                }
            }
            if let Some(reason) = choice.finish_reason {
                tracing::debug!(finish_reason = %reason, "azure finish reason");
                self.close_open_blocks(&mut out);
                self.pending_stop = Some(map_finish_reason(&reason));
            }
        }

        if let Some(usage) = chunk.usage {
            let input = usage.prompt_tokens.unwrap_or(0);
            let output = usage.completion_tokens.unwrap_or(0);
            let total = usage
                .total_tokens
                .unwrap_or_else(|| input.saturating_add(output));
            let mut token_usage = TokenUsage::new(input, output).with_total(total);
            token_usage.cache_read_tokens = usage.prompt_tokens_details.and_then(|d| d.cached_tokens);
            out.push(StreamEvent::usage(token_usage));
            out.extend(self.finish());
        }

        Ok(out)
    }

    fn handle_stream_end(&mut self) -> Vec<StreamEvent> {
        self.finish().into_iter().collect()
    }
}
