//! # Exponential backoff retry policy.
//!
//! [`BackoffPolicy`] grows the reconnect delay after each consecutive failure.
//! It is parameterized by:
//! - [`BackoffPolicy::first`] the delay after the first failure;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap;
//! - [`BackoffPolicy::jitter`] randomization applied to the capped delay.
//!
//! After `n` consecutive failures the base delay is `first × factor^(n-1)`,
//! clamped to `max`, then jitter is applied. The base depends on the failure
//! count only, so jitter never feeds back into later delays.
//!
//! The failure counter lives in the reconnect supervisor's retry state and is
//! reset on every successful connection, so a later loss starts again at `first`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{BackoffPolicy, JitterPolicy, RetryPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay_for(11), Duration::from_secs(10));
//!
//! // As a retry policy: 3 attempts allowed, the third failure gives up.
//! assert!(backoff.next_delay(2, 3).should_retry);
//! assert!(!backoff.next_delay(3, 3).should_retry);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;
use crate::policies::retry::{RetryDecision, RetryPolicy, attempts_remaining};

/// Exponential reconnect backoff.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay after `failures` consecutive failures (1-based).
    ///
    /// `failures = 0` is treated like `1`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max.as_secs_f64();
        let raw = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !raw.is_finite() || raw < 0.0 || raw > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

impl RetryPolicy for BackoffPolicy {
    fn next_delay(&self, attempts: u32, max_attempts: u32) -> RetryDecision {
        if attempts_remaining(attempts, max_attempts) {
            RetryDecision::retry_after(self.delay_for(attempts))
        } else {
            RetryDecision::give_up()
        }
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}
