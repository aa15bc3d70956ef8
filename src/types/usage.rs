//! Token usage, finish reasons and response metadata.

use serde::{Deserialize, Serialize};

/// Token usage reported by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens used
    pub input_tokens: u32,
    /// Output tokens generated
    pub output_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
    /// Prompt tokens served from the vendor's prompt cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
    /// Prompt tokens written into the vendor's prompt cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u32>,
}

impl TokenUsage {
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            cache_read_tokens: None,
            cache_write_tokens: None,
        }
    }

    pub const fn with_total(mut self, total_tokens: u32) -> Self {
        self.total_tokens = total_tokens;
        self
    }

    pub const fn with_cache_read(mut self, tokens: u32) -> Self {
        self.cache_read_tokens = Some(tokens);
        self
    }

    pub const fn with_cache_write(mut self, tokens: u32) -> Self {
        self.cache_write_tokens = Some(tokens);
        self
    }

    /// Merge usage statistics from a later metadata event.
    ///
    /// Counts saturate at `u32::MAX`.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        if let Some(read) = other.cache_read_tokens {
            self.cache_read_tokens =
                Some(self.cache_read_tokens.unwrap_or(0).saturating_add(read));
        }
        if let Some(write) = other.cache_write_tokens {
            self.cache_write_tokens =
                Some(self.cache_write_tokens.unwrap_or(0).saturating_add(write));
        }
    }
}

/// Reason why the model stopped generating tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Completed naturally or hit a stop sequence.
    ///
    /// Maps to Bedrock `end_turn` / `stop_sequence` and OpenAI `stop`.
    Stop,
    /// Hit the output token limit (Bedrock `max_tokens`, OpenAI `length`).
    Length,
    /// The model requested tool execution (Bedrock `tool_use`, OpenAI `tool_calls`).
    ToolExecution,
    /// Output blocked by a guardrail or content filter.
    ContentFilter,
    /// Vendor-specific reason; the raw value is kept.
    Other(String),
}

/// Metadata attached to a completed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub token_usage: Option<TokenUsage>,
    pub finish_reason: FinishReason,
    pub model_id: Option<String>,
}
