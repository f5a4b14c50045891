use anyhow::Result;
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Schedule provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Sent as the `apikey` header when present
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-channel fetch timeout; a hung request becomes a failed channel
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

/// How the gap between retry rounds grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryBackoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Cron expression (with seconds field) evaluated in `timezone`
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
    /// Day offset of the steady-state fetch and end of the first-run fetch
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Stagger between consecutive channel dispatches within a round
    #[serde(default = "default_fetch_interval", with = "duration_serde::duration")]
    pub fetch_interval: Duration,
    /// Wait before the first retry round
    #[serde(default = "default_retry_gap", with = "duration_serde::duration")]
    pub retry_gap: Duration,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: RetryBackoff,
    /// Upper bound for exponential retry gaps
    #[serde(default = "default_max_retry_gap", with = "duration_serde::duration")]
    pub max_retry_gap: Duration,
    /// Retry rounds after the initial round; 0 disables retries
    #[serde(default = "default_max_retry_rounds")]
    pub max_retry_rounds: u32,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_schedules_path")]
    pub schedules_path: PathBuf,
    #[serde(default = "default_channels_path")]
    pub channels_path: PathBuf,
    /// First-run marker
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

// Provider defaults
fn default_provider_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    parse_default_duration(DEFAULT_REQUEST_TIMEOUT)
}

// Ingestion defaults
fn default_cron() -> String {
    DEFAULT_CRON.to_string()
}

fn default_run_on_startup() -> bool {
    DEFAULT_RUN_ON_STARTUP
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_fetch_interval() -> Duration {
    parse_default_duration(DEFAULT_FETCH_INTERVAL)
}

fn default_retry_gap() -> Duration {
    parse_default_duration(DEFAULT_RETRY_GAP)
}

fn default_retry_backoff() -> RetryBackoff {
    RetryBackoff::Fixed
}

fn default_max_retry_gap() -> Duration {
    parse_default_duration(DEFAULT_MAX_RETRY_GAP)
}

fn default_max_retry_rounds() -> u32 {
    DEFAULT_MAX_RETRY_ROUNDS
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_placeholder_image_url() -> String {
    DEFAULT_PLACEHOLDER_IMAGE_URL.to_string()
}

// Storage defaults
fn default_schedules_path() -> PathBuf {
    PathBuf::from(DEFAULT_SCHEDULES_PATH)
}

fn default_channels_path() -> PathBuf {
    PathBuf::from(DEFAULT_CHANNELS_PATH)
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

fn parse_default_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_secs(30))
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            run_on_startup: default_run_on_startup(),
            horizon_days: default_horizon_days(),
            fetch_interval: default_fetch_interval(),
            retry_gap: default_retry_gap(),
            retry_backoff: default_retry_backoff(),
            max_retry_gap: default_max_retry_gap(),
            max_retry_rounds: default_max_retry_rounds(),
            timezone: default_timezone(),
            placeholder_image_url: default_placeholder_image_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            schedules_path: default_schedules_path(),
            channels_path: default_channels_path(),
            state_path: default_state_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            ingestion: IngestionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl IngestionConfig {
    /// Target time zone for midnight truncation and cron evaluation
    pub fn timezone(&self) -> AppResult<Tz> {
        crate::utils::time::parse_timezone(&self.timezone)
    }

    pub fn schedule(&self) -> AppResult<Schedule> {
        Schedule::from_str(&self.cron).map_err(|e| {
            AppError::configuration(format!("Invalid cron expression '{}': {}", self.cron, e))
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        self.timezone()?;
        self.schedule()?;
        if self.horizon_days == 0 {
            return Err(AppError::configuration("horizon_days must be at least 1"));
        }
        if self.retry_backoff == RetryBackoff::Exponential && self.max_retry_gap < self.retry_gap {
            return Err(AppError::configuration(
                "max_retry_gap must not be shorter than retry_gap",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
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

    pub fn validate(&self) -> AppResult<()> {
        if self.provider.base_url.trim().is_empty() {
            return Err(AppError::configuration("provider.base_url must not be empty"));
        }
        self.ingestion.validate()
    }
}
