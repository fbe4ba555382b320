//! Bounded fixed-backoff retry around the transfer step.

use std::fmt::Display;
use std::time::Duration;

use crate::events::{emit, Step};

/// Retry budget for one rule's transfer step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the initial try. Always >= 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts. Never exponential.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Builds a policy from rule fields.
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Pause between attempts. Swappable so tests need not really sleep.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Blocking sleeper used in production. Pipeline ticks run on blocking
/// workers, so a thread sleep never stalls the scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs `op` under the policy's budget.
///
/// `op` receives the 0-based attempt number. Every failed attempt emits a
/// transfer-attempt-failed event naming the rule, file and attempt; the
/// final error is returned to the caller, which routes the item onward
/// with `Failed` status instead of aborting the tick.
pub fn with_retry<T, E: Display>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    rule: &str,
    file: &str,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                emit(
                    rule,
                    file,
                    Step::TransferAttemptFailed,
                    &err.to_string(),
                    attempt,
                );
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                sleeper.sleep(policy.backoff);
            }
        }
    }
}
