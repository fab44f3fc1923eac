//! Usage-monitor API configuration.
//!
//! # Example
//!
//! ```toml
//! [upstream]
//! base_url = "${ANTHROPIC_BASE_URL}"
//! auth_token = "${ANTHROPIC_AUTH_TOKEN}"
//! timeout_secs = 30
//! # Skip detection and pin the API clock to UTC+8
//! timezone_offset_hours = 8
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// The Anthropic-compatible base URL the coding tools are pointed at.
    /// Only its origin is used; the monitor endpoints live next to it.
    pub base_url: String,

    /// Sent verbatim in the `Authorization` header.
    pub auth_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed UTC offset (whole hours) for the API's naive timestamps.
    /// When unset the offset is inferred from the first successful fetch.
    #[serde(default)]
    pub timezone_offset_hours: Option<i32>,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upstream.base_url cannot be empty".into(),
            ));
        }
        if crate::upstream::UsageEndpoints::from_base_url(&self.base_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "upstream.base_url '{}' is not a supported usage monitor (expected api.z.ai or bigmodel.cn)",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(hours) = self.timezone_offset_hours
            && !(-12..=14).contains(&hours)
        {
            return Err(ConfigError::Validation(format!(
                "upstream.timezone_offset_hours {hours} is outside -12..=14"
            )));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    30
}
