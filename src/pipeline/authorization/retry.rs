use std::sync::Mutex;
use std::time::Duration;

use super::EngineError;

/// Why an analysis attempt failed, as far as the retry policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Reply was not JSON or lacked required keys.
    Malformed,
    /// Quota window (HTTP 429).
    RateLimited,
    /// Anything else from the collaborator: transport, 5xx, timeout.
    Transient,
}

impl FailureKind {
    pub fn classify(err: &EngineError) -> Self {
        if err.is_malformed_output() {
            FailureKind::Malformed
        } else if err.is_rate_limited() {
            FailureKind::RateLimited
        } else {
            FailureKind::Transient
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    RetryNow,
    RetryAfter(Duration),
    GiveUp,
}

/// Maps (failure kind, attempt number) to the next step.
///
/// Attempts are 1-based. Malformed output is retried immediately, rate limits
/// wait `rate_limit_base * attempt`, other failures wait `2^(attempt-1)` s.
/// There is no wait after the last attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    rate_limit_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, rate_limit_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rate_limit_base,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn next_step(&self, kind: FailureKind, attempt: u32) -> RetryStep {
        if attempt >= self.max_attempts {
            return RetryStep::GiveUp;
        }

        match kind {
            FailureKind::Malformed => RetryStep::RetryNow,
            FailureKind::RateLimited => RetryStep::RetryAfter(self.rate_limit_base * attempt),
            FailureKind::Transient => {
                let exp = attempt.saturating_sub(1).min(16);
                RetryStep::RetryAfter(Duration::from_secs(1u64 << exp))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}

/// Blocking delay between attempts (allows mocking).
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Test sleeper: records requested delays, never blocks.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for std::sync::Arc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}
