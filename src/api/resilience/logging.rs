//! Structured logging with correlation tracking for API calls
//!
//! Every line is a JSON object carrying the correlation id of the call it belongs
//! to, so interleaved output from concurrent fan-out can be untangled.

use super::config::{LogLevel, MonitoringConfig};
use super::retry::{CallFailure, CallOutcome};
use log::{debug, error, info, trace, warn};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Body fields that must never reach a log line
const SECRET_FIELDS: [&str; 2] = ["key", "token"];

/// Structured logger for API operations with correlation tracking
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single API call with correlation tracking
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    /// Action (get, create, update, associate)
    pub operation_type: String,
    /// Resource the action targets (securable, column, hierarchy, ...)
    pub resource: String,
    pub metadata: HashMap<String, Value>,
    pub start_time: Instant,
}

/// Summary of a finished call
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub attempts: u32,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    /// Start tracking a new call. An empty correlation id gets a fresh one when
    /// correlation ids are enabled.
    pub fn start_operation(
        &self,
        operation_type: &str,
        resource: &str,
        correlation_id: &str,
    ) -> OperationContext {
        let correlation_id = if correlation_id.is_empty() && self.config.correlation_ids {
            uuid::Uuid::new_v4().to_string()
        } else {
            correlation_id.to_string()
        };

        let context = OperationContext {
            correlation_id,
            operation_type: operation_type.to_string(),
            resource: resource.to_string(),
            metadata: HashMap::new(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(&LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "operation_type": context.operation_type,
                "resource": context.resource,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            debug!("API Operation Started: {}", log_data);
        }

        context
    }

    /// Log an outbound request body with credentials redacted
    pub fn log_request(&self, context: &OperationContext, url: &str, body: &Value) {
        if !self.config.request_logging || !self.should_log(&LogLevel::Trace) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "url": url,
            "body": redact_credentials(body),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        trace!("HTTP Request: {}", log_data);
    }

    /// Log the outcome of a single attempt
    pub fn log_attempt<T>(
        &self,
        context: &OperationContext,
        attempt: u32,
        outcome: &CallOutcome<T>,
    ) {
        if !self.config.request_logging {
            return;
        }

        let (result, status, error_message) = match outcome {
            CallOutcome::Success(_) => ("success", None, None),
            CallOutcome::RetryableFailure(failure) => {
                ("retryable_failure", failure.status, Some(failure.to_string()))
            }
            CallOutcome::FatalFailure(failure) => {
                ("fatal_failure", failure.status, Some(failure.to_string()))
            }
        };

        let level = if outcome.is_success() { LogLevel::Debug } else { LogLevel::Info };
        if !self.should_log(&level) {
            return;
        }

        let log_data = json!({
            "event": "call_attempt",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "attempt": attempt,
            "result": result,
            "status_code": status,
            "error": error_message,
            "elapsed_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if outcome.is_success() {
            debug!("Call Attempt: {}", log_data);
        } else {
            info!("Call Attempt: {}", log_data);
        }
    }

    /// Log retry attempt
    pub fn log_retry(
        &self,
        context: &OperationContext,
        attempt: u32,
        error: &str,
        delay: Duration,
    ) {
        if !self.should_log(&LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_scheduled",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "attempt": attempt,
            "error": error,
            "delay_ms": delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Retry Scheduled: {}", log_data);
    }

    /// Log a call that ended without a result
    pub fn log_failure(&self, context: &OperationContext, failure: &CallFailure) {
        let metrics = OperationMetrics {
            duration: context.elapsed(),
            attempts: failure.attempts,
            success: false,
            status_code: failure.status,
            error_message: Some(failure.to_string()),
        };
        self.complete_operation(context, &metrics);
    }

    /// Complete an operation and log metrics
    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        let level = if metrics.success { LogLevel::Debug } else { LogLevel::Error };
        if !self.should_log(&level) {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "resource": context.resource,
            "duration_ms": metrics.duration.as_millis(),
            "attempts": metrics.attempts,
            "success": metrics.success,
            "status_code": metrics.status_code,
            "error_message": metrics.error_message,
            "metadata": context.metadata,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if metrics.success {
            debug!("API Operation Completed: {}", log_data);
        } else {
            error!("API Operation Failed: {}", log_data);
        }
    }

    /// Log a fan-out batch once every task has finished
    pub fn log_batch_operation(
        &self,
        label: &str,
        operation_count: usize,
        duration: Duration,
        success_count: usize,
    ) {
        if !self.should_log(&LogLevel::Info) {
            return;
        }

        let log_data = json!({
            "event": "batch_operation_completed",
            "operation_type": "batch",
            "label": label,
            "operation_count": operation_count,
            "success_count": success_count,
            "failure_count": operation_count.saturating_sub(success_count),
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        info!("Batch Operation Completed: {}", log_data);
    }

    /// Add metadata to an operation context
    pub fn add_metadata(&self, context: &mut OperationContext, key: &str, value: Value) {
        if self.should_log(&LogLevel::Trace) {
            trace!("Added metadata to operation {}: {} = {}", context.correlation_id, key, value);
        }

        context.metadata.insert(key.to_string(), value);
    }

    /// Check if we should log at the given level
    fn should_log(&self, level: &LogLevel) -> bool {
        match (&self.config.log_level, level) {
            (LogLevel::Error, LogLevel::Error) => true,
            (LogLevel::Warn, LogLevel::Error | LogLevel::Warn) => true,
            (LogLevel::Info, LogLevel::Error | LogLevel::Warn | LogLevel::Info) => true,
            (
                LogLevel::Debug,
                LogLevel::Error | LogLevel::Warn | LogLevel::Info | LogLevel::Debug,
            ) => true,
            (LogLevel::Trace, _) => true,
            _ => false,
        }
    }
}

impl Default for ApiLogger {
    fn default() -> Self {
        Self::new(MonitoringConfig::default())
    }
}

/// Copy of a request body with top-level credential fields replaced
pub fn redact_credentials(body: &Value) -> Value {
    match body {
        Value::Object(map) => {
            let mut sanitized = map.clone();
            for field in SECRET_FIELDS {
                if sanitized.contains_key(field) {
                    sanitized.insert(field.to_string(), Value::String("[REDACTED]".to_string()));
                }
            }
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

impl OperationContext {
    /// Calculate elapsed time since operation started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(
        &self,
        success: bool,
        status_code: Option<u16>,
        error_message: Option<String>,
    ) -> OperationMetrics {
        OperationMetrics {
            duration: self.elapsed(),
            attempts: 1,
            success,
            status_code,
            error_message,
        }
    }
}
