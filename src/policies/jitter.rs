//! # Jitter for reconnect delays.
//!
//! Many clients losing the same server at the same moment would otherwise
//! reconnect in lockstep. [`JitterPolicy`] spreads them out:
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + uniform[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] uniform in `[floor, min(prev × 3, max)]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half fixed, half random.
    Equal,
    /// Uniform between a floor and three times the previous delay, capped.
    ///
    /// Needs extra context, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => uniform_ms(0, millis(delay)),
            JitterPolicy::Equal => {
                let half = millis(delay) / 2;
                Duration::from_millis(half) + uniform_ms(0, half)
            }
        }
    }

    /// Applies decorrelated jitter given the floor, the previous delay and the cap.
    ///
    /// Falls back to [`apply`](Self::apply) on `prev` for the other variants.
    pub fn apply_decorrelated(&self, floor: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }
        let lo = millis(floor);
        let hi = millis(prev).saturating_mul(3).min(millis(max)).max(lo);
        if lo == hi {
            return floor;
        }
        uniform_ms(lo, hi)
    }
}

#[inline]
fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

fn uniform_ms(lo: u64, hi: u64) -> Duration {
    if hi <= lo {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}
