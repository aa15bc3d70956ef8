//! siumai-stream-assembly
//!
//! Reassembles a streamed chat response (text, thinking, tool calls, usage)
//! from a vendor delta stream and reports it through ordered callbacks.
//!
//! ```rust,ignore
//! use siumai_stream_assembly::prelude::*;
//!
//! let mut handler = MyHandler::default();
//! let mut dispatcher = CallbackDispatcher::new(&mut handler);
//! let batches = decode_json_lines(BedrockEventConverter::new(), lines);
//! drive_stream(batches, &mut dispatcher).await;
//! ```
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod standards;
pub mod streaming;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod types;

pub use config::StreamConfig;
pub use error::{ConfigError, Result, StreamError, Violation};

pub mod prelude {
    pub use crate::config::StreamConfig;
    pub use crate::error::{ConfigError, StreamError};
    #[cfg(feature = "azure")]
    pub use crate::standards::azure::AzureOpenAiEventConverter;
    #[cfg(feature = "bedrock")]
    pub use crate::standards::bedrock::{BedrockEventConverter, CachePointPlacement};
    pub use crate::streaming::{
        CallbackDispatcher, DispatchState, JsonEventConverter, LoggingListener, PartialState,
        StreamListener, StreamingResponseHandler, decode_json_lines, decode_sse, drive_stream,
    };
    pub use crate::types::*;
}
