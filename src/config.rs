use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::constants::DEFAULT_BASE_URL;
use crate::api::credentials::DEFAULT_SWAP_THRESHOLD;
use crate::api::models::CredentialPair;

pub const ENV_API_KEY: &str = "LUZMO_API_KEY";
pub const ENV_TOKEN: &str = "LUZMO_TOKEN";
pub const ENV_BASE_URL: &str = "LUZMO_BASE_URL";
pub const ENV_BQ_ACCOUNT_ID: &str = "LUZMO_BQ_ACCOUNT_ID";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub credentials: Vec<CredentialPair>,
    #[serde(default)]
    pub credentials_rotation: RotationSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSettings {
    #[serde(default = "default_swap_threshold")]
    pub swap_threshold: u64,
}

fn default_swap_threshold() -> u64 {
    DEFAULT_SWAP_THRESHOLD
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            swap_threshold: default_swap_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Named retry preset; when set it replaces the backoff fields below
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub jitter: bool,
    #[serde(default = "default_execution_budget_secs")]
    pub execution_budget_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    540_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_execution_budget_secs() -> u64 {
    540
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            preset: None,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
            execution_budget_secs: default_execution_budget_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    #[serde(default = "default_true")]
    pub correlation_ids: bool,
    #[serde(default = "default_true")]
    pub request_logging: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSettings {
    #[serde(default)]
    pub bigquery_account_id: Option<String>,
    #[serde(default = "default_acceleration_frequency_hours")]
    pub acceleration_frequency_hours: u32,
}

fn default_acceleration_frequency_hours() -> u32 {
    6
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            bigquery_account_id: None,
            acceleration_frequency_hours: default_acceleration_frequency_hours(),
        }
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("dashboard-cloner")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".dashboard-cloner")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from an explicit path, or the default location when none is given.
    /// A missing file yields defaults; environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        debug!("Loading config from: {:?}", config_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            if path.is_some() {
                warn!("Config file {:?} doesn't exist, using defaults", config_path);
            } else {
                info!("No config file at {:?}, using defaults", config_path);
            }
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        debug!(
            "Loaded config with {} credential pairs",
            config.credentials.len()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration TOML")
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (Some(key), Some(token)) = (lookup(ENV_API_KEY), lookup(ENV_TOKEN)) {
            let pair = CredentialPair::new(key, token);
            if !self.credentials.contains(&pair) {
                debug!("Adding credential pair from environment");
                self.credentials.push(pair);
            }
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.api.base_url = base_url;
        }
        if let Some(account_id) = lookup(ENV_BQ_ACCOUNT_ID) {
            self.provisioning.bigquery_account_id = Some(account_id);
        }
    }
}
