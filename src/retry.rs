//! Bounded retry for remote calls
//!
//! Every browse and value read goes through a [`RetryPolicy`]. Transient
//! errors are retried up to `max_attempts` times with a delay between
//! attempts; anything else fails immediately. When the budget runs out the
//! caller gets [`RemoteError::Exhausted`] wrapping the last error.

use crate::error::{RemoteError, RemoteResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts per remote call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay grows by the base delay on each retry: d, 2d, 3d, ...
    Linear,
}

/// Counters kept by a retry policy
#[derive(Debug, Default)]
pub struct RetryStats {
    /// Calls that eventually succeeded
    pub succeeded: AtomicU64,

    /// Individual failed attempts that were retried
    pub transient_errors: AtomicU64,

    /// Calls that ran out of attempts
    pub exhausted: AtomicU64,

    /// Calls that failed with a non-transient error
    pub permanent_errors: AtomicU64,
}

impl RetryStats {
    pub fn transient(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    pub fn permanent(&self) -> u64 {
        self.permanent_errors.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }
}

/// Retry wrapper for remote calls
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
    stats: RetryStats,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Linear backoff policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Linear,
            stats: RetryStats::default(),
        }
    }

    /// Policy without delays, for tests and local snapshots
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// Delay before attempt number `attempt` (1-based; attempt 1 has none)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay * (attempt - 1),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out
    pub fn run<T, F>(&self, what: &str, mut op: F) -> RemoteResult<T>
    where
        F: FnMut() -> RemoteResult<T>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            match op() {
                Ok(value) => {
                    self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    self.stats.permanent_errors.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                    warn!("{} failed after {} attempts: {}", what, attempt, e);
                    return Err(RemoteError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    self.stats.transient_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("{} attempt {} failed, retrying: {}", what, attempt, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn timeout() -> RemoteError {
        RemoteError::Timeout { node: "n".into() }
    }

    #[test]
    fn test_success_after_transient_failures() {
        let policy = RetryPolicy::immediate(3);
        let calls = Cell::new(0);

        let result = policy.run("browse n", || {
            calls.set(calls.get() + 1);
            if calls.get() <= 2 {
                Err(timeout())
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
        assert_eq!(policy.stats().transient(), 2);
        assert_eq!(policy.stats().exhausted(), 0);
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let policy = RetryPolicy::immediate(3);
        let calls = Cell::new(0);

        let result: RemoteResult<()> = policy.run("browse n", || {
            calls.set(calls.get() + 1);
            Err(timeout())
        });

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert!(matches!(err, RemoteError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.get(), 3);
        assert_eq!(policy.stats().exhausted(), 1);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::immediate(5);
        let calls = Cell::new(0);

        let result: RemoteResult<()> = policy.run("browse n", || {
            calls.set(calls.get() + 1);
            Err(RemoteError::NotFound { node: "n".into() })
        });

        assert!(matches!(result, Err(RemoteError::NotFound { .. })));
        assert_eq!(calls.get(), 1);
        assert_eq!(policy.stats().permanent(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));

        let fixed = RetryPolicy::new(4, Duration::from_millis(100)).with_backoff(Backoff::Fixed);
        assert_eq!(fixed.delay_before(3), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }
}
