//! # Lifecycle state, retry bookkeeping and status snapshots.

use std::fmt;

/// State of the lifecycle supervisor.
///
/// ```text
/// Idle ─► SettingUp ─► Connecting ─► [Joining] ─► Running ─► TearingDown ─► Stopped
///                          │              │          │  ▲
///                          └── failure ───┴──────────┼──┼──► TearingDown ─► Failed
///                                                    ▼  │
///                                              Reconnecting ─► [Joining]
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Never started.
    #[default]
    Idle,
    /// `start()` accepted; setup is beginning.
    SettingUp,
    /// First connection cycle in progress.
    Connecting,
    /// Connection lost; a new connection cycle is in progress.
    Reconnecting,
    /// Connected; waiting for the session handshake.
    Joining,
    /// Connected (and joined); the payload is running or scheduled.
    Running,
    /// Teardown in progress.
    TearingDown,
    /// The run is over.
    Stopped,
    /// Setup failed; teardown has completed.
    Failed,
}

impl ServiceState {
    /// Short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Idle => "idle",
            ServiceState::SettingUp => "setting_up",
            ServiceState::Connecting => "connecting",
            ServiceState::Reconnecting => "reconnecting",
            ServiceState::Joining => "joining",
            ServiceState::Running => "running",
            ServiceState::TearingDown => "tearing_down",
            ServiceState::Stopped => "stopped",
            ServiceState::Failed => "failed",
        }
    }

    /// True for `Stopped` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consecutive failed attempts of one reconnect cycle.
///
/// Reset on every successful connection. With `max_attempts > 0` the count
/// never exceeds `max_attempts`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    /// Fresh state; `max_attempts = 0` means unlimited.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Consecutive failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The cap (`0` = unlimited).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 1-based number of the attempt about to be made.
    pub fn next_attempt(&self) -> u32 {
        self.attempts.saturating_add(1)
    }

    /// Records a failed attempt and returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        if self.max_attempts > 0 {
            self.attempts = self.attempts.min(self.max_attempts);
        }
        self.attempts
    }

    /// True once the cap is reached.
    pub fn exhausted(&self) -> bool {
        self.max_attempts > 0 && self.attempts >= self.max_attempts
    }

    /// Starts a new cycle.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Snapshot of a service, published by the lifecycle task.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Current lifecycle state.
    pub state: ServiceState,
    /// Failed attempts of the most recent connection cycle (0 after a success).
    pub attempts: u32,
    /// Connection losses that started a reconnect cycle.
    pub reconnects: u32,
    /// Payload runs started.
    pub payload_runs: u32,
    /// Teardowns performed.
    pub teardowns: u32,
    /// Teardown steps that failed or ran over budget.
    pub teardown_errors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_saturate_at_the_cap() {
        let mut s = RetryState::new(3);
        assert_eq!(s.next_attempt(), 1);
        for _ in 0..10 {
            s.record_failure();
        }
        assert_eq!(s.attempts(), 3);
        assert!(s.exhausted());
        s.reset();
        assert_eq!(s.attempts(), 0);
        assert!(!s.exhausted());
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut s = RetryState::new(0);
        for _ in 0..1000 {
            s.record_failure();
        }
        assert_eq!(s.attempts(), 1000);
        assert!(!s.exhausted());
    }

    #[test]
    fn terminal_states() {
        assert!(ServiceState::Stopped.is_terminal());
        assert!(ServiceState::Failed.is_terminal());
        assert!(!ServiceState::TearingDown.is_terminal());
        assert_eq!(ServiceState::default(), ServiceState::Idle);
        assert_eq!(ServiceState::Reconnecting.to_string(), "reconnecting");
    }
}
