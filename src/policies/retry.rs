//! # Retry policy: decide whether to try again, and when.
//!
//! [`RetryPolicy`] is a deterministic, side-effect-free function of the number
//! of consecutive failed attempts and the configured cap. The reconnect
//! supervisor consults it after every failed attempt and never needs to know
//! which strategy is plugged in.
//!
//! ## Cap semantics
//! ```text
//! max_attempts = 0 → always retry
//! max_attempts = N → retry while attempts < N; give up after the N-th failure
//! ```
//!
//! ## Implementations
//! - [`ConstantDelay`] the same delay every time (default)
//! - [`BackoffPolicy`](crate::BackoffPolicy) exponential growth with optional jitter
//!
//! Custom strategies implement the trait directly.

use std::{sync::Arc, time::Duration};

/// Outcome of a retry decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub should_retry: bool,
    /// Delay before the next attempt (meaningless when `should_retry` is false).
    pub delay: Duration,
}

impl RetryDecision {
    /// Retry after `delay`.
    #[inline]
    pub fn retry_after(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay,
        }
    }

    /// Give up.
    #[inline]
    pub fn give_up() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Decides retry/give-up and the delay before the next connection attempt.
///
/// `attempts` is the number of consecutive failed attempts so far (`>= 1` when
/// called by the supervisor); `max_attempts = 0` means unlimited.
pub trait RetryPolicy: Send + Sync + 'static {
    /// Computes the decision for the next attempt.
    fn next_delay(&self, attempts: u32, max_attempts: u32) -> RetryDecision;

    /// Returns a short policy name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a retry policy.
pub type RetryRef = Arc<dyn RetryPolicy>;

/// True while the cap allows another attempt.
#[inline]
pub(crate) fn attempts_remaining(attempts: u32, max_attempts: u32) -> bool {
    max_attempts == 0 || attempts < max_attempts
}

/// Fixed delay between attempts.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use linkvisor::{ConstantDelay, RetryPolicy};
///
/// let policy = ConstantDelay::new(Duration::from_secs(5));
/// assert!(policy.next_delay(2, 3).should_retry);
/// assert!(!policy.next_delay(3, 3).should_retry);
/// assert!(policy.next_delay(1_000, 0).should_retry);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantDelay {
    /// Delay before each retry.
    pub delay: Duration,
}

impl ConstantDelay {
    /// Creates a constant-delay policy.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ConstantDelay {
    /// 5 seconds between attempts.
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl RetryPolicy for ConstantDelay {
    fn next_delay(&self, attempts: u32, max_attempts: u32) -> RetryDecision {
        if attempts_remaining(attempts, max_attempts) {
            RetryDecision::retry_after(self.delay)
        } else {
            RetryDecision::give_up()
        }
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_exactly_at_cap() {
        let policy = ConstantDelay::new(Duration::from_millis(10));
        for n in 1..5 {
            assert!(policy.next_delay(n, 5).should_retry, "attempt {n}");
        }
        assert_eq!(policy.next_delay(5, 5), RetryDecision::give_up());
        assert_eq!(policy.next_delay(6, 5), RetryDecision::give_up());
    }

    #[test]
    fn unlimited_never_gives_up() {
        let policy = ConstantDelay::new(Duration::ZERO);
        for n in [1, 10, 10_000, u32::MAX] {
            assert_eq!(
                policy.next_delay(n, 0),
                RetryDecision::retry_after(Duration::ZERO)
            );
        }
    }

    #[test]
    fn cap_of_one_never_retries() {
        let policy = ConstantDelay::default();
        assert!(!policy.next_delay(1, 1).should_retry);
    }
}
