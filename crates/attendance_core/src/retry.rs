//! Bounded retry for idempotent reads.
//!
//! Used for working-set refetch only. PIN verification and mutations are
//! never retried automatically.

use crate::store::{StoreError, StoreResult};
use log::warn;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

pub trait BackoffPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl RetryPolicy {
    /// Runs `call`, retrying transport failures with linear backoff.
    ///
    /// Any other error is returned immediately.
    pub fn run<T>(&self, op: &'static str, mut call: impl FnMut() -> StoreResult<T>) -> StoreResult<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Err(StoreError::Network(_)) if attempt < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "event=retry module=retry status=retrying op={} attempt={} delay_ms={}",
                        op,
                        attempt,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackoffPolicy, RetryPolicy};
    use crate::store::StoreError;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 0,
        }
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(120));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(360));
    }

    #[test]
    fn retries_network_errors_up_to_limit() {
        let calls = Cell::new(0);
        let result: Result<(), StoreError> = fast().run("fetch_records", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Network("reset".to_string()))
        });
        assert!(matches!(result, Err(StoreError::Network(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn does_not_retry_authoritative_errors() {
        let calls = Cell::new(0);
        let result: Result<(), StoreError> = fast().run("fetch_records", || {
            calls.set(calls.get() + 1);
            Err(StoreError::RateLimited)
        });
        assert_eq!(result, Err(StoreError::RateLimited));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn recovers_after_transient_failure() {
        let calls = Cell::new(0);
        let result = fast().run("fetch_records", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(StoreError::Network("reset".to_string()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result, Ok(7));
    }
}
