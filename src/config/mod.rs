//! Configuration for the usage monitor.
//!
//! zquota is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [upstream]
//! base_url = "${ANTHROPIC_BASE_URL}"
//! auth_token = "${ANTHROPIC_AUTH_TOKEN}"
//!
//! [telegram]
//! bot_token = "${TELEGRAM_BOT_TOKEN}"
//! chat_id = "${TELEGRAM_CHAT_ID}"
//!
//! [database]
//! type = "sqlite"
//! path = "zquota.db"
//! ```

mod database;
mod observability;
mod scheduler;
mod telegram;
mod upstream;

use std::path::Path;

pub use database::*;
pub use observability::*;
pub use scheduler::*;
use serde::{Deserialize, Serialize};
pub use telegram::*;
pub use upstream::*;

/// Root configuration.
///
/// `upstream` and `telegram` are required; everything else has defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZquotaConfig {
    /// Usage-monitor API credentials and timing.
    pub upstream: UpstreamConfig,

    /// Bot used for both the periodic report and `/usage` replies.
    pub telegram: TelegramConfig,

    /// Periodic collect-and-report cycle.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Snapshot storage. Required by `serve`, `collect` and `report`.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ZquotaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Catch database types this build can't serve before serde turns
        // them into an "unknown variant" error.
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let config: ZquotaConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.enabled && self.database.is_none() {
            return Err(ConfigError::Validation(
                "The periodic report requires a database configuration \
                 (set [database] or scheduler.enabled = false)"
                    .into(),
            ));
        }

        self.upstream.validate()?;
        self.telegram.validate()?;
        self.scheduler.validate()?;
        self.database.validate()?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let Some(type_val) = raw
        .get("database")
        .and_then(|v| v.get("type"))
        .and_then(|v| v.as_str())
    else {
        return Ok(());
    };

    let missing: Option<&str> = match type_val {
        #[cfg(not(feature = "database-sqlite"))]
        "sqlite" => Some("database-sqlite"),
        #[cfg(not(feature = "database-postgres"))]
        "postgres" => Some("database-postgres"),
        _ => None,
    };

    match missing {
        Some(feature) => Err(ConfigError::Validation(format!(
            "database type '{type_val}' requires the '{feature}' feature\n\n\
             Rebuild with: cargo build --features {feature}"
        ))),
        None => Ok(()),
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables that appear after a `#` on the same line are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("env var pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
