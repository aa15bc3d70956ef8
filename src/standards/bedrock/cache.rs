//! Bedrock prompt-cache points.
//!
//! A cache point marks the end of a prompt prefix Bedrock may serve from its
//! prompt cache. Bedrock accepts at most [`MAX_CACHE_POINTS`] per request.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Cache points allowed per Bedrock request.
pub const MAX_CACHE_POINTS: usize = 4;

/// Where an automatic cache point is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePointPlacement {
    AfterSystem,
    AfterUserMessage,
    AfterTools,
}

/// One block of the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemBlock {
    Text {
        text: String,
        #[serde(default)]
        cache_point: bool,
    },
    /// Vendor-specific content passed through untouched.
    Raw { value: serde_json::Value },
}

impl SystemBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            cache_point: false,
        }
    }

    pub fn text_with_cache_point(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            cache_point: true,
        }
    }

    pub const fn has_cache_point(&self) -> bool {
        matches!(
            self,
            Self::Text {
                cache_point: true,
                ..
            }
        )
    }
}

/// Count cache points and reject more than [`MAX_CACHE_POINTS`].
pub fn validate_cache_points(blocks: &[SystemBlock]) -> Result<usize, ConfigError> {
    let count = blocks.iter().filter(|b| b.has_cache_point()).count();
    if count > MAX_CACHE_POINTS {
        return Err(ConfigError::TooManyCachePoints {
            count,
            max: MAX_CACHE_POINTS,
        });
    }
    Ok(count)
}

/// Apply `placement` to the system prompt and return the resulting cache point count.
///
/// Only [`CachePointPlacement::AfterSystem`] touches system blocks. When the last
/// block already carries a cache point or is vendor-specific, placement is
/// skipped with a warning and the request goes ahead unchanged.
pub fn place_cache_points(
    blocks: &mut [SystemBlock],
    placement: CachePointPlacement,
) -> Result<usize, ConfigError> {
    let count = validate_cache_points(blocks)?;
    if placement != CachePointPlacement::AfterSystem {
        return Ok(count);
    }

    match blocks.last_mut() {
        Some(SystemBlock::Text { cache_point, .. }) if !*cache_point => {
            if count + 1 > MAX_CACHE_POINTS {
                return Err(ConfigError::TooManyCachePoints {
                    count: count + 1,
                    max: MAX_CACHE_POINTS,
                });
            }
            *cache_point = true;
            Ok(count + 1)
        }
        Some(last) => {
            tracing::warn!(
                block = ?last,
                "last system block is vendor-specific or already cached; skipping AFTER_SYSTEM cache point"
            );
            Ok(count)
        }
        None => Ok(count),
    }
}

/// Render system blocks in ConverseStream `system` form.
pub fn to_converse_system(blocks: &[SystemBlock]) -> Vec<serde_json::Value> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            SystemBlock::Text { text, cache_point } => {
                out.push(json!({ "text": text }));
                if *cache_point {
                    out.push(json!({ "cachePoint": { "type": "default" } }));
                }
            }
            SystemBlock::Raw { value } => out.push(value.clone()),
        }
    }
    out
}
