//! Wire converters.
//!
//! A converter turns each vendor wire chunk into zero or more [`StreamEvent`]s.
//! Converters keep whatever state the wire format needs (synthesized block
//! indices, deferred stops) and, like the dispatcher, are owned by a single
//! request.

use crate::error::StreamError;
use crate::types::StreamEvent;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};

/// Converts provider JSON chunks into unified stream events.
pub trait JsonEventConverter {
    /// Convert one JSON chunk. A chunk may produce several events, or none.
    fn convert_json(&mut self, json_data: &str) -> Result<Vec<StreamEvent>, StreamError>;

    /// Flush events the converter was holding back when the wire stream ends.
    fn handle_stream_end(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }
}

/// Decode a stream of JSON lines (one chunk per line) into event batches.
///
/// A line-level error ends the stream after being forwarded.
pub fn decode_json_lines<C, S>(
    mut converter: C,
    lines: S,
) -> impl Stream<Item = Result<Vec<StreamEvent>, StreamError>>
where
    C: JsonEventConverter,
    S: Stream<Item = Result<String, StreamError>>,
{
    async_stream::stream! {
        futures_util::pin_mut!(lines);
        let mut failed = false;
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    yield converter.convert_json(line);
                }
                Err(err) => {
                    failed = true;
                    yield Err(err);
                    break;
                }
            }
        }
        if !failed {
            let tail = converter.handle_stream_end();
            if !tail.is_empty() {
                yield Ok(tail);
            }
        }
    }
}

/// Decode a Server-Sent Events byte stream into event batches.
///
/// Each SSE `data` payload is one JSON chunk; `[DONE]` ends the stream.
pub fn decode_sse<C, S, B, E>(
    mut converter: C,
    bytes: S,
) -> impl Stream<Item = Result<Vec<StreamEvent>, StreamError>>
where
    C: JsonEventConverter,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let events = bytes.eventsource();
        futures_util::pin_mut!(events);
        let mut failed = false;
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == "[DONE]" {
                        break;
                    }
                    yield converter.convert_json(data);
                }
                Err(err) => {
                    failed = true;
                    yield Err(StreamError::transport(err));
                    break;
                }
            }
        }
        if !failed {
            let tail = converter.handle_stream_end();
            if !tail.is_empty() {
                yield Ok(tail);
            }
        }
    }
}
