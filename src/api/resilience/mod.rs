//! Resilience features for Luzmo API calls
//!
//! Retry policies with a run-wide deadline, configuration presets and
//! structured call logging.

pub mod config;
pub mod deadline;
pub mod logging;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig};
pub use deadline::RunDeadline;
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use retry::{CallFailure, CallOutcome, FailureKind, RetryConfig, RetryPolicy};
