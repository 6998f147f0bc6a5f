//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::providers::{ReqwestTransport, TransportError};

/// Errors from invalid runtime settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency_limit must be at least 1")]
    InvalidConcurrency,

    #[error("request_timeout must be greater than zero")]
    InvalidTimeout,
}

/// Scheduling and transport settings for a run.
///
/// Durations are written in humantime form: `200ms`, `1m 30s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Cases with in-flight work at once
    pub concurrency_limit: usize,

    /// Pause after each criterion's verdict call
    #[serde(with = "humantime_duration")]
    pub evaluation_delay: Duration,

    /// Per-request HTTP timeout
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 1,
            evaluation_delay: Duration::from_millis(200),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_evaluation_delay(mut self, delay: Duration) -> Self {
        self.evaluation_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// HTTP transport honoring `request_timeout`.
    pub fn transport(&self) -> Result<ReqwestTransport, TransportError> {
        ReqwestTransport::new(self.request_timeout)
    }
}
