use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Parsed entries between parse progress events
    #[serde(default = "default_parse_progress_interval")]
    pub parse_progress_interval: usize,
    /// Channel insertions between store commits
    #[serde(default = "default_channel_commit_interval")]
    pub channel_commit_interval: usize,
    /// Group insertions between store commits
    #[serde(default = "default_group_commit_interval")]
    pub group_commit_interval: usize,
    /// Logo value stored for channels without a logo attribute
    #[serde(default = "default_missing_logo_placeholder")]
    pub missing_logo_placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connection establishment limit, e.g. "10s". Unset means no limit.
    pub connect_timeout: Option<String>,
    /// Longest gap between body chunks before the transfer fails. Unset means no limit.
    pub stall_timeout: Option<String>,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_parse_progress_interval() -> usize {
    DEFAULT_PARSE_PROGRESS_INTERVAL
}

fn default_channel_commit_interval() -> usize {
    DEFAULT_CHANNEL_COMMIT_INTERVAL
}

fn default_group_commit_interval() -> usize {
    DEFAULT_GROUP_COMMIT_INTERVAL
}

fn default_missing_logo_placeholder() -> String {
    DEFAULT_MISSING_LOGO_PLACEHOLDER.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            parse_progress_interval: default_parse_progress_interval(),
            channel_commit_interval: default_channel_commit_interval(),
            group_commit_interval: default_group_commit_interval(),
            missing_logo_placeholder: default_missing_logo_placeholder(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: None,
            stall_timeout: None,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Result<Option<Duration>> {
        parse_optional_duration("http.connect_timeout", self.connect_timeout.as_deref())
    }

    pub fn stall_timeout(&self) -> Result<Option<Duration>> {
        parse_optional_duration("http.stall_timeout", self.stall_timeout.as_deref())
    }
}

fn parse_optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            humantime::parse_duration(v)
                .with_context(|| format!("Invalid duration for {field}: '{v}'"))
        })
        .transpose()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {config_file}"))?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the ingestion pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let ingestion = &self.ingestion;
        if ingestion.parse_progress_interval == 0
            || ingestion.channel_commit_interval == 0
            || ingestion.group_commit_interval == 0
        {
            anyhow::bail!("Ingestion intervals must be greater than zero");
        }
        self.http.connect_timeout()?;
        self.http.stall_timeout()?;
        Ok(())
    }
}
