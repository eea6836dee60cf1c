//! # Restart policy for the payload runner.
//!
//! [`RestartPolicy`] decides whether the payload is started again after a run
//! ends on its own. Two independent flags cover the four combinations:
//!
//! ```text
//! on_failure  on_completion   behavior
//! ─────────── ─────────────   ─────────────────────────────────────────────
//! false       false           one-shot: any end of the run tears the service down
//! true        false           crash recovery (default)
//! false       true            periodic job that must not fail
//! true        true            run forever
//! ```
//!
//! A run that ends because it was cancelled (stop, connection loss) is never
//! subject to this policy, and [`PayloadError::Fatal`](crate::PayloadError::Fatal)
//! is never restarted.

use std::time::Duration;

use crate::payload::RunOutcome;

/// Payload restart flags plus the delay before a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restart after `RunOutcome::Failed` with a restartable error.
    pub on_failure: bool,
    /// Restart after `RunOutcome::CompletedNormally`.
    pub on_completion: bool,
    /// Wait before the next run.
    pub delay: Duration,
}

impl Default for RestartPolicy {
    /// Restart on failure only, after 15 seconds.
    fn default() -> Self {
        Self {
            on_failure: true,
            on_completion: false,
            delay: Duration::from_secs(15),
        }
    }
}

impl RestartPolicy {
    /// Never restart.
    pub fn never() -> Self {
        Self {
            on_failure: false,
            on_completion: false,
            delay: Duration::ZERO,
        }
    }

    /// Always restart after `delay`.
    pub fn always(delay: Duration) -> Self {
        Self {
            on_failure: true,
            on_completion: true,
            delay,
        }
    }

    /// Returns whether another run should follow `outcome`.
    pub fn should_restart(&self, outcome: &RunOutcome) -> bool {
        match outcome {
            RunOutcome::CompletedNormally => self.on_completion,
            RunOutcome::Failed(err) => self.on_failure && err.is_restartable(),
            RunOutcome::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayloadError;

    #[test]
    fn default_restarts_on_failure_only() {
        let policy = RestartPolicy::default();
        assert!(policy.should_restart(&RunOutcome::Failed(PayloadError::fail("x"))));
        assert!(!policy.should_restart(&RunOutcome::CompletedNormally));
        assert!(!policy.should_restart(&RunOutcome::Cancelled));
    }

    #[test]
    fn fatal_is_never_restarted() {
        let policy = RestartPolicy::always(Duration::ZERO);
        assert!(!policy.should_restart(&RunOutcome::Failed(PayloadError::fatal("x"))));
        assert!(policy.should_restart(&RunOutcome::CompletedNormally));
    }

    #[test]
    fn never_restarts_nothing() {
        let policy = RestartPolicy::never();
        assert!(!policy.should_restart(&RunOutcome::Failed(PayloadError::fail("x"))));
        assert!(!policy.should_restart(&RunOutcome::CompletedNormally));
    }
}
