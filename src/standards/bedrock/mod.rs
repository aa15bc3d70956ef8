//! Amazon Bedrock (ConverseStream) standard.

mod cache;
mod stream;

pub use cache::{
    CachePointPlacement, MAX_CACHE_POINTS, SystemBlock, place_cache_points, to_converse_system,
    validate_cache_points,
};
pub use stream::{BedrockEventConverter, map_stop_reason};
