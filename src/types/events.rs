//! Stream Event Types
//!
//! The closed set of events a vendor transport delivers for one request.
//! Events arrive in strict order on a single delivery channel; an index never
//! reappears after its `BlockStop`.

use super::usage::{FinishReason, TokenUsage};
use serde::{Deserialize, Serialize};

/// Kind of a content block, fixed when the block starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    /// Tool id and name are only sent once, at block start.
    ToolUse { id: String, name: String },
}

impl BlockKind {
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Short label used in logs and violation messages.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Thinking => "thinking",
            Self::ToolUse { .. } => "tool_use",
        }
    }
}

/// One event from a vendor stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    BlockStart { index: usize, kind: BlockKind },
    TextDelta { index: usize, text: String },
    ThinkingDelta { index: usize, text: String },
    /// Opaque signature fragment for a thinking block.
    ThinkingSignature { index: usize, signature: String },
    ToolArgumentDelta { index: usize, fragment: String },
    BlockStop { index: usize },
    MessageStop { finish_reason: FinishReason },
    Metadata {
        usage: Option<TokenUsage>,
        model_id: Option<String>,
    },
}

impl StreamEvent {
    pub fn block_start(index: usize, kind: BlockKind) -> Self {
        Self::BlockStart { index, kind }
    }

    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self::TextDelta {
            index,
            text: text.into(),
        }
    }

    pub fn thinking(index: usize, text: impl Into<String>) -> Self {
        Self::ThinkingDelta {
            index,
            text: text.into(),
        }
    }

    pub fn tool_arguments(index: usize, fragment: impl Into<String>) -> Self {
        Self::ToolArgumentDelta {
            index,
            fragment: fragment.into(),
        }
    }

    pub const fn block_stop(index: usize) -> Self {
        Self::BlockStop { index }
    }

    pub const fn message_stop(finish_reason: FinishReason) -> Self {
        Self::MessageStop { finish_reason }
    }

    pub const fn usage(usage: TokenUsage) -> Self {
        Self::Metadata {
            usage: Some(usage),
            model_id: None,
        }
    }

    /// Block index the event targets, if any.
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::BlockStart { index, .. }
            | Self::TextDelta { index, .. }
            | Self::ThinkingDelta { index, .. }
            | Self::ThinkingSignature { index, .. }
            | Self::ToolArgumentDelta { index, .. }
            | Self::BlockStop { index } => Some(*index),
            Self::MessageStop { .. } | Self::Metadata { .. } => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::BlockStart { .. } => "block_start",
            Self::TextDelta { .. } => "text_delta",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ThinkingSignature { .. } => "thinking_signature",
            Self::ToolArgumentDelta { .. } => "tool_argument_delta",
            Self::BlockStop { .. } => "block_stop",
            Self::MessageStop { .. } => "message_stop",
            Self::Metadata { .. } => "metadata",
        }
    }
}
