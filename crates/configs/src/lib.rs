//! # configs
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `YELL__SECTION__KEY` environment variables. A `.env` file is loaded into
//! the environment first when present.

use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "YELL";
/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "YELL_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "yell";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardSettings {
    pub page_size: i64,
    pub cached_pages: usize,
    pub cache_ttl_secs: u64,
    pub max_threads: i64,
    pub prune_interval_secs: u64,
    pub delete_code_length: usize,
    pub trusted_image_hosts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaSettings {
    pub ttl_secs: u64,
    pub prune_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub board: BoardSettings,
    pub captcha: CaptchaSettings,
    pub log: LogSettings,
    /// Contact address shown in generic error responses
    pub report_to: String,
}

impl BoardSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

impl CaptchaSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 9001)?
        .set_default("database.url", "sqlite://yell.db")?
        .set_default("database.max_connections", 5)?
        .set_default("board.page_size", 15)?
        .set_default("board.cached_pages", 10)?
        .set_default("board.cache_ttl_secs", 30)?
        .set_default("board.max_threads", 150)?
        .set_default("board.prune_interval_secs", 120)?
        .set_default("board.delete_code_length", 4)?
        .set_default(
            "board.trusted_image_hosts",
            vec!["https://i.postimg.cc/", "https://i.imgur.com/"],
        )?
        .set_default("captcha.ttl_secs", 300)?
        .set_default("captcha.prune_interval_secs", 300)?
        .set_default("log.format", "pretty")?
        .set_default("report_to", "bug@example.org")?)
}

impl Settings {
    /// Loads `.env`, then defaults, the settings file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let settings: Settings = defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("board.trusted_image_hosts"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults only. Handy for tests and tools.
    pub fn from_defaults() -> Result<Self, ConfigError> {
        let settings: Settings = defaults()?.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("board.page_size", self.board.page_size > 0),
            ("board.cached_pages", self.board.cached_pages > 0),
            ("board.cache_ttl_secs", self.board.cache_ttl_secs > 0),
            ("board.max_threads", self.board.max_threads > 0),
            ("board.prune_interval_secs", self.board.prune_interval_secs > 0),
            ("board.delete_code_length", self.board.delete_code_length > 0),
            ("captcha.ttl_secs", self.captcha.ttl_secs > 0),
            ("captcha.prune_interval_secs", self.captcha.prune_interval_secs > 0),
            ("database.max_connections", self.database.max_connections > 0),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::Invalid {
                key: *key,
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.board.trusted_image_hosts.is_empty() {
            return Err(ConfigError::Invalid {
                key: "board.trusted_image_hosts",
                reason: "at least one host prefix is required".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
