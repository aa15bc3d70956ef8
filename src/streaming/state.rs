//! Per-request accumulation state.
//!
//! A [`PartialState`] is owned by exactly one in-flight request and is driven by
//! that request's single delivery channel. It is not shared and needs no locking;
//! every mutating method takes `&mut self`.

use crate::config::StreamConfig;
use crate::error::{Result, StreamError, Violation};
use crate::types::{BlockKind, FinishReason, StreamEvent, TokenUsage};
use std::collections::{BTreeMap, BTreeSet};

/// An open block and its growing buffer.
#[derive(Debug, Clone)]
pub(crate) struct BlockAccumulator {
    pub(crate) kind: BlockKind,
    pub(crate) buffer: String,
    pub(crate) signature: Option<String>,
}

impl BlockAccumulator {
    pub(crate) fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
            signature: None,
        }
    }
}

/// A block that has received its `BlockStop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedBlock {
    pub index: usize,
    pub kind: BlockKind,
    pub content: String,
    pub signature: Option<String>,
}

/// What happened when an event was applied, used by the dispatcher to pick
/// the matching callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    BlockOpened,
    Text(String),
    Thinking(String),
    ToolArguments,
    Signature,
    BlockClosed,
    Metadata,
    /// Terminal event; the caller should now assemble.
    MessageStop(FinishReason),
}

/// Mutable accumulator for one streamed response.
#[derive(Debug, Clone)]
pub struct PartialState {
    pub(crate) open: BTreeMap<usize, BlockAccumulator>,
    pub(crate) closed: BTreeSet<usize>,
    pub(crate) completed: Vec<CompletedBlock>,
    pub(crate) usage: Option<TokenUsage>,
    pub(crate) model_id: Option<String>,
    pub(crate) return_thinking: bool,
    pub(crate) max_buffer_bytes: Option<usize>,
}

impl Default for PartialState {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialState {
    pub fn new() -> Self {
        Self::with_config(&StreamConfig::default())
    }

    pub fn with_config(config: &StreamConfig) -> Self {
        Self {
            open: BTreeMap::new(),
            closed: BTreeSet::new(),
            completed: Vec::new(),
            usage: None,
            model_id: None,
            return_thinking: config.return_thinking,
            max_buffer_bytes: config.max_buffer_bytes,
        }
    }

    /// Seed the model id, e.g. from the request. A `Metadata` event may override it.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Apply one block-level or metadata event.
    ///
    /// `MessageStop` leaves the state untouched; it is the trigger for
    /// [`PartialState::assemble`].
    pub fn apply(&mut self, event: StreamEvent) -> Result<Applied> {
        match event {
            StreamEvent::BlockStart { index, kind } => {
                self.start_block(index, kind)?;
                Ok(Applied::BlockOpened)
            }
            StreamEvent::TextDelta { index, text } => {
                self.append_text(index, &text)?;
                Ok(Applied::Text(text))
            }
            StreamEvent::ThinkingDelta { index, text } => {
                self.append_thinking(index, &text)?;
                Ok(Applied::Thinking(text))
            }
            StreamEvent::ThinkingSignature { index, signature } => {
                self.append_signature(index, &signature)?;
                Ok(Applied::Signature)
            }
            StreamEvent::ToolArgumentDelta { index, fragment } => {
                self.append_tool_arguments(index, &fragment)?;
                Ok(Applied::ToolArguments)
            }
            StreamEvent::BlockStop { index } => {
                self.stop_block(index)?;
                Ok(Applied::BlockClosed)
            }
            StreamEvent::Metadata { usage, model_id } => {
                self.record_metadata(usage, model_id);
                Ok(Applied::Metadata)
            }
            StreamEvent::MessageStop { finish_reason } => Ok(Applied::MessageStop(finish_reason)),
        }
    }

    fn record_metadata(&mut self, usage: Option<TokenUsage>, model_id: Option<String>) {
        if let Some(usage) = usage {
            match self.usage.as_mut() {
                Some(current) => current.merge(&usage),
                None => self.usage = Some(usage),
            }
        }
        if model_id.is_some() {
            self.model_id = model_id;
        }
    }

    /// Look up the open block at `index`, distinguishing closed from never-started.
    pub(crate) fn open_block_mut(&mut self, index: usize) -> Result<&mut BlockAccumulator> {
        if self.closed.contains(&index) {
            return Err(StreamError::violation(index, Violation::BlockClosed));
        }
        self.open
            .get_mut(&index)
            .ok_or_else(|| StreamError::violation(index, Violation::UnknownBlock))
    }

    pub fn has_open_blocks(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn open_indices(&self) -> Vec<usize> {
        self.open.keys().copied().collect()
    }

    /// Closed blocks in closure order.
    pub fn completed_blocks(&self) -> &[CompletedBlock] {
        &self.completed
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        self.usage.as_ref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}
