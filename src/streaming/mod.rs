//! Streaming Module
//!
//! Reassembles a vendor delta stream into one complete response:
//! - `state`: per-request accumulation state
//! - `accumulator`: appends text / thinking / tool-argument fragments
//! - `sequencer`: opens and closes content blocks
//! - `assembler`: builds the final message and metadata
//! - `dispatcher`: invokes the consumer callbacks in order
//! - `listener`: best-effort lifecycle observers
//! - `driver`: async loop over a transport stream with an idle timeout
//! - `converters`: vendor wire chunk decoding

mod accumulator;
mod assembler;
mod converters;
mod dispatcher;
mod driver;
mod listener;
mod sequencer;
mod state;

pub use converters::*;
pub use dispatcher::*;
pub use driver::*;
pub use listener::{LoggingListener, StreamListener};
pub use state::*;
