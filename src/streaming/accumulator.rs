//! Delta accumulation.
//!
//! Fragments are appended to the buffer of the block open at their index, in
//! arrival order and exactly once. There is no buffering across indices.

use super::state::PartialState;
use crate::error::{Result, StreamError, Violation};
use crate::types::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeltaKind {
    Text,
    Thinking,
    ToolArguments,
}

impl DeltaKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Thinking => "thinking",
            Self::ToolArguments => "tool argument",
        }
    }

    const fn accepts(self, kind: &BlockKind) -> bool {
        matches!(
            (self, kind),
            (Self::Text, BlockKind::Text)
                | (Self::Thinking, BlockKind::Thinking)
                | (Self::ToolArguments, BlockKind::ToolUse { .. })
        )
    }
}

impl PartialState {
    /// Append a text fragment to the text block at `index`.
    pub fn append_text(&mut self, index: usize, text: &str) -> Result<()> {
        self.append(index, DeltaKind::Text, text)
    }

    /// Append a thinking fragment to the thinking block at `index`.
    pub fn append_thinking(&mut self, index: usize, text: &str) -> Result<()> {
        self.append(index, DeltaKind::Thinking, text)
    }

    /// Append a raw JSON fragment to the tool-use block at `index`.
    pub fn append_tool_arguments(&mut self, index: usize, fragment: &str) -> Result<()> {
        self.append(index, DeltaKind::ToolArguments, fragment)
    }

    /// Append a signature fragment to the thinking block at `index`.
    pub fn append_signature(&mut self, index: usize, signature: &str) -> Result<()> {
        let block = self.open_block_mut(index)?;
        if !DeltaKind::Thinking.accepts(&block.kind) {
            return Err(StreamError::violation(
                index,
                Violation::KindMismatch {
                    expected: block.kind.label(),
                    found: "signature",
                },
            ));
        }
        if !signature.is_empty() {
            block
                .signature
                .get_or_insert_with(String::new)
                .push_str(signature);
        }
        Ok(())
    }

    fn append(&mut self, index: usize, delta: DeltaKind, fragment: &str) -> Result<()> {
        let limit = self.max_buffer_bytes;
        let block = self.open_block_mut(index)?;
        if !delta.accepts(&block.kind) {
            return Err(StreamError::violation(
                index,
                Violation::KindMismatch {
                    expected: block.kind.label(),
                    found: delta.label(),
                },
            ));
        }
        if let Some(limit) = limit
            && block.buffer.len() + fragment.len() > limit
        {
            return Err(StreamError::violation(
                index,
                Violation::BufferOverflow { limit },
            ));
        }
        block.buffer.push_str(fragment);
        Ok(())
    }
}
