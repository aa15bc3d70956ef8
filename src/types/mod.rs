//! Core types shared by the streaming pipeline and the vendor converters.

mod events;
mod message;
mod usage;

pub use events::*;
pub use message::*;
pub use usage::*;
