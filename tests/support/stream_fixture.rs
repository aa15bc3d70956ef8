//! Test fixtures utilities: load JSON-lines / SSE streaming chunks and record callbacks

#![allow(dead_code)]

use siumai_stream_assembly::prelude::*;
use std::io;
use std::path::{Path, PathBuf};

pub fn fixtures_dir(vendor: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(vendor)
        .join("chat")
}

/// Load a JSON-lines fixture, one chunk per non-empty line
pub fn load_json_lines(path: &Path) -> Vec<Result<String, StreamError>> {
    std::fs::read_to_string(path)
        .expect("read fixture file")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(l.to_string()))
        .collect()
}

/// Load an SSE fixture as a byte stream split into `chunk_size` pieces,
/// so events straddle transport chunk boundaries.
pub fn load_sse_fixture_as_bytes(path: &Path, chunk_size: usize) -> Vec<Result<Vec<u8>, io::Error>> {
    let raw = std::fs::read_to_string(path).expect("read fixture file");
    // Normalize line endings
    let normalized = raw.replace("\r\n", "\n");
    normalized
        .as_bytes()
        .chunks(chunk_size)
        .map(|c| Ok(c.to_vec()))
        .collect()
}

/// Every callback invocation, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Thinking(String),
    Partial(String),
    ToolCall(ToolExecutionRequest),
    Complete(AssembledMessage, ResponseMetadata),
    Error(StreamError),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
}

impl Recorder {
    pub fn partial_text(&self) -> String {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Partial(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Complete(..) | Call::Error(_)))
            .count()
    }

    pub fn completion(&self) -> Option<(&AssembledMessage, &ResponseMetadata)> {
        self.calls.iter().find_map(|c| match c {
            Call::Complete(m, meta) => Some((m, meta)),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<&StreamError> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }
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
