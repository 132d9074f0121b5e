use std::collections::HashSet;

use config::{Config, File, FileFormat};
pub use config::ConfigError;
use serde::Deserialize;

use crate::grid::{GridConfig, GridError, GridResult, PaperConfig, PollingConfig};

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Poll cadence shared by every bot
    #[serde(default)]
    pub polling: PollingConfig,
    /// Simulated terminal
    #[serde(default)]
    pub paper: PaperConfig,
    /// One entry per bot instance
    #[serde(default)]
    pub bots: Vec<BotSettings>,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A named grid bot
#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    pub name: String,
    #[serde(flatten)]
    pub grid: GridConfig,
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment variables override the file
            // e.g. APP_POLLING__POLL_INTERVAL_MS=500
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Reject bot entries that could never start
    pub fn validate(&self) -> GridResult<()> {
        if self.bots.is_empty() {
            return Err(GridError::InvalidConfig("no bots configured".into()));
        }

        let mut names = HashSet::new();
        for bot in &self.bots {
            if !names.insert(bot.name.as_str()) {
                return Err(GridError::InvalidConfig(format!(
                    "duplicate bot name '{}'",
                    bot.name
                )));
            }
            bot.grid.validate().map_err(|e| match e {
                GridError::InvalidConfig(msg) => {
                    GridError::InvalidConfig(format!("bot '{}': {}", bot.name, msg))
                }
                other => other,
            })?;
        }

        Ok(())
    }
}
