use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Static sink configuration, validated once at startup.
///
/// `auto_tag_table` switches routing from the fixed `table` to one
/// destination table per event tag, created on demand.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    pub database: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub auto_tag_table: bool,
    #[serde(default)]
    pub include_tag_key: bool,
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
    #[serde(default)]
    pub include_time_key: bool,
    #[serde(default = "default_time_key")]
    pub time_key: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    28015
}

fn default_table() -> String {
    "log".to_string()
}

fn default_tag_key() -> String {
    "tag".to_string()
}

fn default_time_key() -> String {
    "time".to_string()
}

impl SinkConfig {
    /// Configuration for `database` with every other option at its default.
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            host: default_host(),
            port: default_port(),
            table: default_table(),
            auto_tag_table: false,
            include_tag_key: false,
            tag_key: default_tag_key(),
            include_time_key: false,
            time_key: default_time_key(),
        }
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: SinkConfig =
            serde_yaml::from_str(&content).context("failed to parse sink config")?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let config_str = std::env::var("TABLE_SINK_CONFIG")
            .map_err(|_| anyhow::anyhow!("TABLE_SINK_CONFIG environment variable not set"))?;
        let config: SinkConfig =
            serde_yaml::from_str(&config_str).context("failed to parse sink config")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database".to_string(),
            });
        }
        if self.table.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "table name cannot be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "port cannot be 0".to_string(),
            });
        }
        if self.include_tag_key && self.tag_key.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "tag_key cannot be empty when include_tag_key is set".to_string(),
            });
        }
        if self.include_time_key && self.time_key.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "time_key cannot be empty when include_time_key is set".to_string(),
            });
        }
        Ok(())
    }
}
