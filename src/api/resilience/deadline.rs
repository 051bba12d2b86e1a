//! Run-wide wall-clock deadline
//!
//! Set once when a run starts. Every retry decision checks the remaining
//! budget against it; once it has elapsed no new attempt is scheduled.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RunDeadline {
    started_at: Instant,
    budget: Duration,
}

impl RunDeadline {
    /// Start the clock now with the given execution budget
    pub fn start(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    /// A deadline that has already passed
    pub fn expired() -> Self {
        Self::start(Duration::ZERO)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Whether waiting `delay` from now would reach or pass the deadline
    pub fn would_exceed(&self, delay: Duration) -> bool {
        self.elapsed() + delay >= self.budget
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_deadline() {
        let deadline = RunDeadline::expired();
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(deadline.would_exceed(Duration::ZERO));
    }

    #[test]
    fn test_fresh_deadline() {
        let deadline = RunDeadline::start(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(59));
        assert!(!deadline.would_exceed(Duration::from_secs(1)));
        assert!(deadline.would_exceed(Duration::from_secs(61)));
    }
}
