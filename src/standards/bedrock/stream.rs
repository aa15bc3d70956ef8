//! Bedrock ConverseStream decoding (JSON lines).

use crate::error::StreamError;
use crate::streaming::JsonEventConverter;
use crate::types::{BlockKind, FinishReason, StreamEvent, TokenUsage};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockMessageStop {
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockUsageInfo {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    total_tokens: Option<u32>,
    cache_read_input_tokens: Option<u32>,
    cache_write_input_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct BedrockMetadata {
    usage: Option<BedrockUsageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockToolUseStart {
    tool_use_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BedrockContentBlockStartInner {
    #[serde(default, rename = "toolUse")]
    tool_use: Option<BedrockToolUseStart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockContentBlockStart {
    content_block_index: Option<usize>,
    start: Option<BedrockContentBlockStartInner>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockContentBlockStop {
    content_block_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct BedrockReasoningDelta {
    text: Option<String>,
    signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BedrockToolUseDelta {
    input: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockDelta {
    text: Option<String>,
    reasoning_content: Option<BedrockReasoningDelta>,
    tool_use: Option<BedrockToolUseDelta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockContentBlockDelta {
    content_block_index: Option<usize>,
    delta: Option<BedrockDelta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockStreamChunk {
    #[serde(default)]
    content_block_start: Option<BedrockContentBlockStart>,
    #[serde(default)]
    content_block_delta: Option<BedrockContentBlockDelta>,
    #[serde(default)]
    content_block_stop: Option<BedrockContentBlockStop>,
    #[serde(default)]
    metadata: Option<BedrockMetadata>,
    #[serde(default)]
    message_stop: Option<BedrockMessageStop>,
}

/// Map a Bedrock `stopReason` onto [`FinishReason`].
pub fn map_stop_reason(raw: &str) -> FinishReason {
    match raw {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolExecution,
        "guardrail_intervened" | "content_filtered" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Converts ConverseStream chunks into [`StreamEvent`]s.
///
/// Bedrock only announces tool blocks with `contentBlockStart`; text and
/// reasoning blocks begin with their first delta, so the converter emits the
/// `BlockStart` itself. `messageStop` arrives before the `metadata` chunk that
/// carries usage, so the `MessageStop` event is held back until metadata (or
/// the end of the wire stream).
#[derive(Debug, Default)]
pub struct BedrockEventConverter {
    open: BTreeMap<usize, &'static str>,
    seen: BTreeSet<usize>,
    pending_stop: Option<FinishReason>,
}

impl BedrockEventConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `BlockStart` if `index` has not been seen yet.
    fn ensure_started(&mut self, index: usize, kind: BlockKind, out: &mut Vec<StreamEvent>) {
        if self.seen.insert(index) {
            self.open.insert(index, kind.label());
            out.push(StreamEvent::block_start(index, kind));
        }
    }

    /// Release the held-back `MessageStop`, if any.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.pending_stop.take().map(StreamEvent::message_stop)
    }
}

impl JsonEventConverter for BedrockEventConverter {
    fn convert_json(&mut self, json_data: &str) -> Result<Vec<StreamEvent>, StreamError> {
        let chunk: BedrockStreamChunk = serde_json::from_str(json_data)?;
        let mut out = Vec::new();

        if let Some(start) = chunk.content_block_start
            && let Some(index) = start.content_block_index
            && let Some(tool) = start.start.and_then(|s| s.tool_use)
        {
            let id = tool.tool_use_id.unwrap_or_default();
            let name = tool.name.unwrap_or_default();
            if self.seen.insert(index) {
                self.open.insert(index, "tool_use");
            }
            // Re-announced indices go through so the sequencer can reject them.
            out.push(StreamEvent::block_start(index, BlockKind::tool_use(id, name)));
        }

        if let Some(block) = chunk.content_block_delta
            && let Some(index) = block.content_block_index
            && let Some(delta) = block.delta
        {
            if let Some(text) = delta.text {
                self.ensure_started(index, BlockKind::Text, &mut out);
                out.push(StreamEvent::text(index, text));
            }
            if let Some(reasoning) = delta.reasoning_content {
                if let Some(text) = reasoning.text {
                    self.ensure_started(index, BlockKind::Thinking, &mut out);
                    out.push(StreamEvent::thinking(index, text));
                }
                if let Some(signature) = reasoning.signature {
                    self.ensure_started(index, BlockKind::Thinking, &mut out);
                    out.push(StreamEvent::ThinkingSignature { index, signature });
                }
            }
            if let Some(input) = delta.tool_use.and_then(|t| t.input) {
                out.push(StreamEvent::tool_arguments(index, input));
            }
        }

        if let Some(index) = chunk.content_block_stop.and_then(|s| s.content_block_index) {
            if self.seen.contains(&index) {
                self.open.remove(&index);
                out.push(StreamEvent::block_stop(index));
            } else {
                // Empty block: Bedrock closes an index that never carried a delta.
                tracing::debug!(index, "skipping stop for a block without content");
            }
        }

        if let Some(stop) = chunk.message_stop {
            let raw = stop.stop_reason.unwrap_or_default();
            tracing::debug!(stop_reason = %raw, "bedrock message stop");
            self.pending_stop = Some(map_stop_reason(&raw));
        }

        if let Some(meta) = chunk.metadata {
            let usage = meta.usage.map(|u| {
                let input = u.input_tokens.unwrap_or(0);
                let output = u.output_tokens.unwrap_or(0);
                let total = u
                    .total_tokens
                    .unwrap_or_else(|| input.saturating_add(output));
                let mut usage = TokenUsage::new(input, output).with_total(total);
                usage.cache_read_tokens = u.cache_read_input_tokens;
                usage.cache_write_tokens = u.cache_write_input_tokens;
                usage
            });
            out.push(StreamEvent::Metadata {
                usage,
                model_id: None,
            });
            out.extend(self.finish());
        }

        Ok(out)
    }

    fn handle_stream_end(&mut self) -> Vec<StreamEvent> {
        if !self.open.is_empty() {
            tracing::debug!(open = ?self.open, "bedrock stream ended with open blocks");
        }
        self.finish().into_iter().collect()
    }
}
