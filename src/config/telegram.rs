use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    pub bot_token: String,

    /// Chat that receives the periodic report.
    pub chat_id: String,

    /// Bot API root. Overridable for local Bot API servers and tests.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Answer `/usage` commands. Disable to run the bot as send-only.
    #[serde(default = "default_true")]
    pub commands_enabled: bool,

    /// What `/usage` replies with.
    #[serde(default)]
    pub command_source: CommandSource,
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token cannot be empty".into(),
            ));
        }
        if self.chat_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.chat_id cannot be empty".into(),
            ));
        }
        if url::Url::parse(&self.api_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "telegram.api_url '{}' is not a valid URL",
                self.api_url
            )));
        }
        Ok(())
    }
}

/// Data source for on-demand `/usage` replies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Latest snapshot written by the periodic worker.
    #[default]
    Stored,
    /// A fresh fetch from the usage monitor, not persisted.
    Live,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
