//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use worksync_core::{Backoff, HttpConfig, RetryPolicy};
use worksync_openalex::query::{DEFAULT_CHUNK_SIZE, MAX_PER_PAGE, OPENALEX_WORKS};
use worksync_store::{DEFAULT_TABLE, StoreConfig};

/// Global configuration for worksync
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub openalex: OpenAlexConfig,
    pub http: HttpSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAlexConfig {
    pub endpoint: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub mailto: Option<String>,
    pub institution_ror: Option<String>,
    pub author_ids: Vec<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub per_page: u32,
    pub chunk_size: usize,
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            endpoint: OPENALEX_WORKS.to_string(),
            mailto: std::env::var("WORKSYNC_MAILTO").ok(),
            institution_ror: None,
            author_ids: Vec::new(),
            from_date: None,
            to_date: None,
            per_page: MAX_PER_PAGE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub max_retries: u32,
    pub cooldown_secs: u64,
    /// "fixed" or "exponential"
    pub backoff: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub workers: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            cooldown_secs: RetryPolicy::DEFAULT_COOLDOWN.as_secs(),
            backoff: "fixed".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 30,
            workers: 4,
        }
    }
}

impl HttpSection {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let backoff = Backoff::from_name(&self.backoff)
            .with_context(|| format!("unknown backoff {:?} (fixed|exponential)", self.backoff))?;
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            cooldown: Duration::from_secs(self.cooldown_secs),
            backoff,
        })
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..HttpConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub database: Option<PathBuf>,
    pub table: String,
    pub excluded_authors: Vec<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database: None,
            table: DEFAULT_TABLE.to_string(),
            excluded_authors: Vec::new(),
        }
    }
}

impl StoreSection {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database: self.database.clone(),
            table: self.table.clone(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./worksync.toml (current directory)
    /// 2. ~/.config/worksync/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("worksync.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "worksync") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
