//! Resilience configuration with builder pattern
//!
//! Provides a unified configuration for retry policies and monitoring
//! features with sane defaults.

use super::retry::RetryConfig;
use log::warn;
use std::time::Duration;

/// Global resilience configuration for API operations
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub monitoring: MonitoringConfig,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Conservative config for production tenants with tight rate limits
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            monitoring: MonitoringConfig {
                correlation_ids: true,
                request_logging: true,
                log_level: LogLevel::Warn,
            },
        }
    }

    /// Aggressive config for development/testing
    pub fn development() -> Self {
        Self {
            retry: RetryConfig::aggressive(),
            monitoring: MonitoringConfig {
                correlation_ids: true,
                request_logging: true,
                log_level: LogLevel::Debug,
            },
        }
    }

    /// Disable retries and request logging (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(0),
                max_delay: Duration::from_millis(0),
                backoff_multiplier: 1.0,
                jitter: false,
                execution_budget: RetryConfig::default().execution_budget,
            },
            monitoring: MonitoringConfig {
                correlation_ids: false,
                request_logging: false,
                log_level: LogLevel::Error,
            },
        }
    }

    /// Look up a preset by name: `default`, `conservative`, `development` or `disabled`
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "default" => Some(Self::default()),
            "conservative" => Some(Self::conservative()),
            "development" => Some(Self::development()),
            "disabled" => Some(Self::disabled()),
            _ => None,
        }
    }

    /// Build the run's resilience settings from the loaded configuration file
    ///
    /// A `[retry] preset` supplies the backoff settings. The execution budget and
    /// the `[monitoring]` section always come from the file.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let settings = &config.retry;
        let execution_budget = Duration::from_secs(settings.execution_budget_secs);
        let preset = settings.preset.as_deref().and_then(|name| {
            let found = Self::preset(name);
            if found.is_none() {
                warn!("Unknown retry preset '{}', using the [retry] settings", name);
            }
            found
        });

        let retry = match preset {
            Some(preset) => RetryConfig {
                execution_budget,
                ..preset.retry
            },
            None => RetryConfig {
                max_attempts: settings.max_attempts,
                base_delay: Duration::from_millis(settings.initial_delay_ms),
                max_delay: Duration::from_millis(settings.max_delay_ms),
                backoff_multiplier: settings.backoff_multiplier,
                jitter: settings.jitter,
                execution_budget,
            },
        };

        Self {
            retry,
            monitoring: MonitoringConfig {
                correlation_ids: config.monitoring.correlation_ids,
                request_logging: config.monitoring.request_logging,
                log_level: LogLevel::parse(&config.monitoring.log_level),
            },
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set max attempts per call (including the first)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set the wall-clock budget for the whole run
    pub fn execution_budget(mut self, budget: Duration) -> Self {
        self.config.retry.execution_budget = budget;
        self
    }

    pub fn monitoring_config(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    pub fn correlation_ids(mut self, enabled: bool) -> Self {
        self.config.monitoring.correlation_ids = enabled;
        self
    }

    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
