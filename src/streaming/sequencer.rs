//! Content block sequencing.
//!
//! Each index moves `absent -> open -> closed` exactly once. Blocks are appended
//! to the completed list in the order they close.

use super::state::{BlockAccumulator, CompletedBlock, PartialState};
use crate::error::{Result, StreamError, Violation};
use crate::types::BlockKind;

impl PartialState {
    /// Register a new open block.
    pub fn start_block(&mut self, index: usize, kind: BlockKind) -> Result<()> {
        if self.closed.contains(&index) {
            return Err(StreamError::violation(index, Violation::IndexReused));
        }
        if self.open.contains_key(&index) {
            return Err(StreamError::violation(index, Violation::AlreadyOpen));
        }
        tracing::debug!(index, kind = kind.label(), "block started");
        self.open.insert(index, BlockAccumulator::new(kind));
        Ok(())
    }

    /// Close the block at `index` and append it to the completed list.
    pub fn stop_block(&mut self, index: usize) -> Result<()> {
        if self.closed.contains(&index) {
            return Err(StreamError::violation(index, Violation::BlockClosed));
        }
        let block = self
            .open
            .remove(&index)
            .ok_or_else(|| StreamError::violation(index, Violation::UnknownBlock))?;

        if let BlockKind::ToolUse { id, name } = &block.kind
            && !block.buffer.is_empty()
            && serde_json::from_str::<serde_json::Value>(&block.buffer).is_err()
        {
            // Passed through verbatim; validation is the consumer's concern.
            tracing::debug!(
                index,
                tool_id = %id,
                tool_name = %name,
                "tool arguments are not valid JSON at block stop"
            );
        }

        tracing::debug!(index, kind = block.kind.label(), bytes = block.buffer.len(), "block stopped");
        self.closed.insert(index);
        self.completed.push(CompletedBlock {
            index,
            kind: block.kind,
            content: block.buffer,
            signature: block.signature,
        });
        Ok(())
    }

    /// Close several blocks delivered in the same event batch, lowest index first.
    ///
    /// Stops at the first failing index; blocks before it stay closed.
    pub fn stop_blocks(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<()> {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        for index in indices {
            self.stop_block(index)?;
        }
        Ok(())
    }
}
