//! The assembled assistant message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute key for the thinking signature. Persisted conversations depend on it.
pub const THINKING_SIGNATURE_KEY: &str = "thinking_signature";

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments, exactly as streamed.
    pub arguments: String,
}

impl ToolExecutionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the arguments as JSON, if they are valid JSON.
    pub fn parsed_arguments(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.arguments).ok()
    }
}

/// Complete assistant message built once at `MessageStop`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledMessage {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub tool_execution_requests: Vec<ToolExecutionRequest>,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AssembledMessage {
    pub fn has_tool_execution_requests(&self) -> bool {
        !self.tool_execution_requests.is_empty()
    }

    pub fn thinking_signature(&self) -> Option<&str> {
        self.attributes
            .get(THINKING_SIGNATURE_KEY)
            .and_then(|v| v.as_str())
    }
}
