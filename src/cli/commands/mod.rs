pub mod clone;
pub mod provision;
pub mod sync;

use anyhow::Result;
use log::debug;
use serde::Serialize;

use dashboard_cloner::api::{ApiLogger, LuzmoClient, ResilienceConfig, RetryPolicy};
use dashboard_cloner::config::Config;

/// Client for this run. The run deadline starts when it is built.
pub fn build_client(config: &Config) -> Result<LuzmoClient> {
    let resilience = ResilienceConfig::from_config(config);
    debug!(
        "Retry policy: {} attempts, {:?} initial delay, {:?} budget",
        resilience.retry.max_attempts,
        resilience.retry.base_delay,
        resilience.retry.execution_budget
    );
    let policy =
        RetryPolicy::new(resilience.retry).with_logger(ApiLogger::new(resilience.monitoring));
    LuzmoClient::from_config(config, policy)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
