//! Retry policies with exponential backoff bounded by a run deadline
//!
//! Every remote call goes through [`RetryPolicy::execute`]. The operation reports a
//! [`CallOutcome`]; rate limiting, gateway timeouts and transport errors are retried,
//! everything else is returned to the caller as-is.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use super::config::MonitoringConfig;
use super::deadline::RunDeadline;
use super::logging::{ApiLogger, OperationContext};
use crate::api::constants::backoff_status;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    /// Wall-clock budget shared by every call of a run
    pub execution_budget: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(540),
            backoff_multiplier: 2.0,
            jitter: false,
            execution_budget: Duration::from_secs(540),
        }
    }
}

impl RetryConfig {
    /// Conservative config for production
    pub fn conservative() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
            execution_budget: Duration::from_secs(540),
        }
    }

    /// Aggressive config for development/testing
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.5,
            jitter: true,
            execution_budget: Duration::from_secs(540),
        }
    }
}

/// Why a call did not produce a usable result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429
    RateLimited,
    /// HTTP 504 or a client-side request timeout
    Timeout,
    /// Connection refused, reset, DNS, unreadable body
    Transport,
    /// Any other 4xx
    ClientRejected(u16),
    /// 5xx other than 504
    ServerError(u16),
    /// 2xx whose body is missing what the caller needs
    InvalidResponse,
    /// The run deadline was reached before the call could succeed
    DeadlineExceeded,
    /// All attempts were spent on retryable failures
    RetriesExhausted,
    /// The task performing the call panicked
    Panicked,
    /// The task for the call could not be built, so no call was made
    NotStarted,
}

impl FailureKind {
    /// Determine if this failure type should be retried
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::Timeout | FailureKind::Transport
        )
    }

    /// Classify a non-success HTTP status code
    pub fn from_status_code(status: u16) -> Self {
        match status {
            backoff_status::RATE_LIMITED => FailureKind::RateLimited,
            backoff_status::GATEWAY_TIMEOUT => FailureKind::Timeout,
            500..=599 => FailureKind::ServerError(status),
            _ => FailureKind::ClientRejected(status),
        }
    }

    /// Classify a reqwest error (no response was received)
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FailureKind::Timeout
        } else if let Some(status) = error.status() {
            Self::from_status_code(status.as_u16())
        } else {
            FailureKind::Transport
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::ClientRejected(status) => write!(f, "rejected with HTTP {}", status),
            FailureKind::ServerError(status) => write!(f, "server error HTTP {}", status),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::DeadlineExceeded => write!(f, "deadline exceeded"),
            FailureKind::RetriesExhausted => write!(f, "retries exhausted"),
            FailureKind::Panicked => write!(f, "task panicked"),
            FailureKind::NotStarted => write!(f, "task not started"),
        }
    }
}

/// Failure details carried by a [`CallOutcome`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
    pub attempts: u32,
}

impl CallFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            attempts: 0,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Failure for a non-success HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::new(FailureKind::from_status_code(status), truncate(body, 500)).with_status(status)
    }

    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        let failure = Self::new(FailureKind::from_reqwest_error(error), error.to_string());
        match error.status() {
            Some(status) => failure.with_status(status.as_u16()),
            None => failure,
        }
    }
}

/// Result of a remote call, as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    RetryableFailure(CallFailure),
    FatalFailure(CallFailure),
}

impl<T> CallOutcome<T> {
    /// Wrap a failure in the variant its kind calls for
    pub fn failed(failure: CallFailure) -> Self {
        if failure.kind.should_retry() {
            CallOutcome::RetryableFailure(failure)
        } else {
            CallOutcome::FatalFailure(failure)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::RetryableFailure(failure) | CallOutcome::FatalFailure(failure) => {
                Some(failure)
            }
        }
    }

    pub fn into_result(self) -> Result<T, CallFailure> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::RetryableFailure(failure) | CallOutcome::FatalFailure(failure) => {
                Err(failure)
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Success(value) => CallOutcome::Success(f(value)),
            CallOutcome::RetryableFailure(failure) => CallOutcome::RetryableFailure(failure),
            CallOutcome::FatalFailure(failure) => CallOutcome::FatalFailure(failure),
        }
    }
}

/// Retry policy that implements exponential backoff against a shared run deadline
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    deadline: RunDeadline,
    logger: ApiLogger,
}

impl RetryPolicy {
    /// Create a policy whose deadline starts now
    pub fn new(config: RetryConfig) -> Self {
        let deadline = RunDeadline::start(config.execution_budget);
        Self::with_deadline(config, deadline)
    }

    pub fn with_deadline(config: RetryConfig, deadline: RunDeadline) -> Self {
        Self {
            config,
            deadline,
            logger: ApiLogger::new(MonitoringConfig::default()),
        }
    }

    pub fn with_logger(mut self, logger: ApiLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn deadline(&self) -> RunDeadline {
        self.deadline
    }

    pub fn logger(&self) -> &ApiLogger {
        &self.logger
    }

    /// Execute an operation with retry logic.
    ///
    /// The returned outcome is never `RetryableFailure`: retryable failures are either
    /// retried or converted to a fatal `RetriesExhausted`/`DeadlineExceeded`.
    pub async fn execute<F, Fut, T>(
        &self,
        context: &OperationContext,
        operation: F,
    ) -> CallOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_failure: Option<CallFailure> = None;

        for attempt in 1..=max_attempts {
            if self.deadline.is_expired() {
                let failure = self.deadline_failure(attempt - 1, last_failure.as_ref());
                self.logger.log_failure(context, &failure);
                return CallOutcome::FatalFailure(failure);
            }

            debug!(
                "Executing {} (attempt {}/{})",
                context.operation_type, attempt, max_attempts
            );
            let outcome = operation().await;
            self.logger.log_attempt(context, attempt, &outcome);

            match outcome {
                CallOutcome::Success(value) => {
                    let mut metrics = context.create_metrics(true, None, None);
                    metrics.attempts = attempt;
                    self.logger.complete_operation(context, &metrics);
                    if attempt > 1 {
                        info!(
                            "{} {} succeeded after {} attempts",
                            context.operation_type, context.resource, attempt
                        );
                    }
                    return CallOutcome::Success(value);
                }
                CallOutcome::FatalFailure(mut failure) => {
                    failure.attempts = attempt;
                    self.logger.log_failure(context, &failure);
                    return CallOutcome::FatalFailure(failure);
                }
                CallOutcome::RetryableFailure(mut failure) => {
                    failure.attempts = attempt;

                    if attempt == max_attempts {
                        let exhausted = CallFailure {
                            kind: FailureKind::RetriesExhausted,
                            message: format!(
                                "gave up after {} attempts, last error: {}",
                                attempt, failure
                            ),
                            status: failure.status,
                            attempts: attempt,
                        };
                        self.logger.log_failure(context, &exhausted);
                        return CallOutcome::FatalFailure(exhausted);
                    }

                    let delay = self.calculate_delay(attempt).min(self.deadline.remaining());
                    if self.deadline.would_exceed(delay) {
                        let deadline_failure = self.deadline_failure(attempt, Some(&failure));
                        self.logger.log_failure(context, &deadline_failure);
                        return CallOutcome::FatalFailure(deadline_failure);
                    }

                    warn!(
                        "{} {} failed on attempt {} ({}), backing off {:?}",
                        context.operation_type, context.resource, attempt, failure.kind, delay
                    );
                    self.logger.log_retry(context, attempt, &failure.to_string(), delay);
                    last_failure = Some(failure);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        let failure = last_failure.unwrap_or_else(|| {
            CallFailure::new(FailureKind::RetriesExhausted, "no attempt was made")
        });
        CallOutcome::FatalFailure(failure)
    }

    fn deadline_failure(&self, attempts: u32, last: Option<&CallFailure>) -> CallFailure {
        let mut message = format!(
            "run deadline of {:?} reached after {:?}",
            self.deadline.budget(),
            self.deadline.elapsed()
        );
        if let Some(last) = last {
            message.push_str(&format!(", last error: {}", last));
        }
        CallFailure {
            kind: FailureKind::DeadlineExceeded,
            message,
            status: last.and_then(|f| f.status),
            attempts,
        }
    }

    /// Calculate exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_delay {
            delay = self.config.max_delay;
        }

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms).min(self.config.max_delay);
        }

        delay
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::config::LogLevel;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
            execution_budget: Duration::from_secs(30),
        }
    }

    fn context() -> OperationContext {
        let logger = ApiLogger::new(MonitoringConfig {
            correlation_ids: true,
            request_logging: false,
            log_level: LogLevel::Error,
        });
        logger.start_operation("get", "securable", "test-123")
    }

    #[test]
    fn test_failure_classification() {
        assert!(FailureKind::RateLimited.should_retry());
        assert!(FailureKind::Timeout.should_retry());
        assert!(FailureKind::Transport.should_retry());

        assert!(!FailureKind::ClientRejected(400).should_retry());
        assert!(!FailureKind::ServerError(500).should_retry());
        assert!(!FailureKind::InvalidResponse.should_retry());
        assert!(!FailureKind::DeadlineExceeded.should_retry());
        assert!(!FailureKind::NotStarted.should_retry());
    }

    #[test]
    fn test_status_code_classification() {
        assert_eq!(FailureKind::from_status_code(429), FailureKind::RateLimited);
        assert_eq!(FailureKind::from_status_code(504), FailureKind::Timeout);
        assert_eq!(FailureKind::from_status_code(400), FailureKind::ClientRejected(400));
        assert_eq!(FailureKind::from_status_code(404), FailureKind::ClientRejected(404));
        assert_eq!(FailureKind::from_status_code(500), FailureKind::ServerError(500));
        assert_eq!(FailureKind::from_status_code(503), FailureKind::ServerError(503));
        assert!(FailureKind::from_status_code(backoff_status::RATE_LIMITED).should_retry());
        assert!(FailureKind::from_status_code(backoff_status::GATEWAY_TIMEOUT).should_retry());
        assert!(!FailureKind::from_status_code(503).should_retry());
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
            execution_budget: Duration::from_secs(60),
        });

        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
            execution_budget: Duration::from_secs(60),
        });

        assert_eq!(policy.calculate_delay(5), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_rate_limited_call_exhausts_attempts() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome: CallOutcome<()> = policy
            .execute(&context(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::failed(CallFailure::from_status(429, "slow down"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match outcome {
            CallOutcome::FatalFailure(failure) => {
                assert_eq!(failure.kind, FailureKind::RetriesExhausted);
                assert_eq!(failure.attempts, 3);
                assert_eq!(failure.status, Some(429));
            }
            other => panic!("expected fatal failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_makes_no_call() {
        let policy = RetryPolicy::with_deadline(fast_config(5), RunDeadline::expired());
        let calls = Arc::new(AtomicU32::new(0));

        let outcome: CallOutcome<()> = policy
            .execute(&context(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::Success(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let failure = outcome.failure().cloned().unwrap();
        assert_eq!(failure.kind, FailureKind::DeadlineExceeded);
        assert_eq!(failure.attempts, 0);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let policy = RetryPolicy::new(fast_config(5));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome: CallOutcome<()> = policy
            .execute(&context(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::failed(CallFailure::from_status(400, "bad request"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.failure().map(|f| f.kind.clone()),
            Some(FailureKind::ClientRejected(400))
        );
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let policy = RetryPolicy::new(fast_config(5));
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = policy
            .execute(&context(), || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        CallOutcome::failed(CallFailure::from_status(504, "gateway timeout"))
                    } else {
                        CallOutcome::Success(n)
                    }
                }
            })
            .await;

        assert_eq!(outcome, CallOutcome::Success(3));
    }

    #[tokio::test]
    async fn test_backoff_past_deadline_stops_early() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
            execution_budget: Duration::from_millis(200),
        };
        let policy = RetryPolicy::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let started = std::time::Instant::now();

        let outcome: CallOutcome<()> = policy
            .execute(&context(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::failed(CallFailure::from_status(429, "slow down"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            outcome.failure().map(|f| f.kind.clone()),
            Some(FailureKind::DeadlineExceeded)
        );
    }

    #[test]
    fn test_outcome_helpers() {
        let ok: CallOutcome<u32> = CallOutcome::Success(7);
        assert!(ok.is_success());
        assert_eq!(ok.clone().map(|v| v * 2).success(), Some(14));
        assert_eq!(ok.into_result(), Ok(7));

        let retryable: CallOutcome<u32> =
            CallOutcome::failed(CallFailure::new(FailureKind::Transport, "reset"));
        assert!(matches!(retryable, CallOutcome::RetryableFailure(_)));

        let fatal: CallOutcome<u32> =
            CallOutcome::failed(CallFailure::new(FailureKind::InvalidResponse, "no id"));
        assert!(matches!(fatal, CallOutcome::FatalFailure(_)));
        assert!(fatal.into_result().is_err());
    }
}
