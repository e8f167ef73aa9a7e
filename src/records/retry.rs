//! Bounded exponential backoff for persistence operations.

use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, StoreError};

/// How many times an operation is attempted and how long to wait between
/// attempts. The wait doubles after every failure: `base`, `2 * base`,
/// `4 * base`, ...
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Wait after the first failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Default attempts for writes.
    pub const WRITE_ATTEMPTS: u32 = 3;

    /// Default attempts for reads. Reads are idempotent, so they retry longer.
    pub const READ_ATTEMPTS: u32 = 10;

    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// 3 attempts, 1s then 2s.
    pub const fn writes() -> Self {
        Self::new(Self::WRITE_ATTEMPTS, Duration::from_secs(1))
    }

    /// 10 attempts starting at 1s.
    pub const fn reads() -> Self {
        Self::new(Self::READ_ATTEMPTS, Duration::from_secs(1))
    }

    /// Wait after the `failures`-th consecutive failure (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out.
    pub fn run<T>(&self, operation: &'static str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut failures = 0;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    failures += 1;
                    if failures >= attempts {
                        return Err(StoreError::RetriesExhausted {
                            operation,
                            attempts,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.backoff(failures);
                    warn!(
                        operation,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}
