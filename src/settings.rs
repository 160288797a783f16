use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "polling_extract";
pub const ENV_PREFIX: &str = "PSX";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub max_chunk_size: usize,
    pub pace_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: None,
            base_url: "https://translation.googleapis.com/language/translate/v2".to_string(),
            source_lang: "pa".to_string(),
            target_lang: "en".to_string(),
            max_chunk_size: 4500,
            pace_ms: 200,
            max_retries: 2,
            base_backoff_ms: 1000,
            concurrency: 4,
        }
    }
}

impl Settings {
    /// Defaults, then `polling_extract.toml` if present, then `PSX_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "max_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "base_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}
