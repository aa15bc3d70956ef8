//! Response assembly.

use super::state::PartialState;
use crate::error::{Result, StreamError};
use crate::types::{
    AssembledMessage, BlockKind, FinishReason, ResponseMetadata, THINKING_SIGNATURE_KEY,
    ToolExecutionRequest,
};

const EMPTY_TOOL_ARGUMENTS: &str = "{}";

impl PartialState {
    /// Build the final message and metadata from the closed blocks.
    ///
    /// Pure function of the state: calling it twice yields equal results. Fails
    /// with [`StreamError::IncompleteStream`] while any block is still open.
    pub fn assemble(
        &self,
        finish_reason: FinishReason,
    ) -> Result<(AssembledMessage, ResponseMetadata)> {
        if self.has_open_blocks() {
            return Err(StreamError::IncompleteStream {
                open_indices: self.open_indices(),
            });
        }

        let mut text: Option<String> = None;
        let mut thinking: Option<String> = None;
        let mut signature: Option<&str> = None;
        let mut tool_execution_requests = Vec::new();

        for block in &self.completed {
            match &block.kind {
                BlockKind::Text => {
                    text.get_or_insert_with(String::new).push_str(&block.content);
                }
                BlockKind::Thinking if self.return_thinking => {
                    thinking
                        .get_or_insert_with(String::new)
                        .push_str(&block.content);
                    if signature.is_none() {
                        signature = block.signature.as_deref();
                    }
                }
                BlockKind::Thinking => {}
                BlockKind::ToolUse { id, name } => {
                    // a tool called without input still carries an empty JSON object
                    let arguments = if block.content.is_empty() {
                        EMPTY_TOOL_ARGUMENTS.to_string()
                    } else {
                        block.content.clone()
                    };
                    tool_execution_requests.push(ToolExecutionRequest {
                        id: id.clone(),
                        name: name.clone(),
                        arguments,
                    });
                }
            }
        }

        let mut message = AssembledMessage {
            text,
            thinking,
            tool_execution_requests,
            ..Default::default()
        };
        if let Some(sig) = signature {
            message.attributes.insert(
                THINKING_SIGNATURE_KEY.to_string(),
                serde_json::Value::String(sig.to_string()),
            );
        }

        let metadata = ResponseMetadata {
            token_usage: self.usage.clone(),
            finish_reason,
            model_id: self.model_id.clone(),
        };

        Ok((message, metadata))
    }
}
