//! Stream assembly configuration.
//!
//! ```rust,ignore
//! let config = StreamConfig::builder()
//!     .return_thinking(false)
//!     .idle_timeout(Duration::from_secs(30))
//!     .build()?;
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default idle timeout between two stream events (the vendor clients' default).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-request assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Forward thinking deltas and keep thinking in the assembled message.
    ///
    /// When disabled, thinking blocks are still validated but their content and
    /// signature are dropped. Defaults to `true`, unlike the Bedrock client's
    /// own `returnThinking` switch.
    pub return_thinking: bool,
    /// Maximum wait between two events, in milliseconds. `None` waits forever.
    pub idle_timeout_ms: Option<u64>,
    /// Maximum size of a single block buffer, in bytes.
    pub max_buffer_bytes: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            return_thinking: true,
            idle_timeout_ms: Some(DEFAULT_IDLE_TIMEOUT.as_millis() as u64),
            max_buffer_bytes: None,
        }
    }
}

impl StreamConfig {
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }

    /// Load and validate a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.max_buffer_bytes == Some(0) {
            return Err(ConfigError::InvalidBufferLimit);
        }
        Ok(())
    }
}

/// Builder for [`StreamConfig`]
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    return_thinking: Option<bool>,
    idle_timeout: Option<Option<Duration>>,
    max_buffer_bytes: Option<usize>,
}

impl StreamConfigBuilder {
    pub fn return_thinking(mut self, enabled: bool) -> Self {
        self.return_thinking = Some(enabled);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(Some(timeout));
        self
    }

    /// Never time out while waiting for the next event.
    pub fn no_idle_timeout(mut self) -> Self {
        self.idle_timeout = Some(None);
        self
    }

    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.max_buffer_bytes = Some(limit);
        self
    }

    pub fn build(self) -> Result<StreamConfig, ConfigError> {
        let defaults = StreamConfig::default();
        let idle_timeout_ms = match self.idle_timeout {
            Some(timeout) => timeout.map(|d| d.as_millis() as u64),
            None => defaults.idle_timeout_ms,
        };
        let config = StreamConfig {
            return_thinking: self.return_thinking.unwrap_or(defaults.return_thinking),
            idle_timeout_ms,
            max_buffer_bytes: self.max_buffer_bytes,
        };
        config.validate()?;
        Ok(config)
    }
}
