//! Retry and restart policies.
//!
//! This module groups the knobs that control **whether/when** a connection is
//! retried, **how long** to wait between attempts, and **whether** a payload
//! is restarted after it finishes.
//!
//! ## Contents
//! - [`RetryPolicy`] pure decision: retry or give up, and the delay before the next attempt
//! - [`ConstantDelay`] the default retry policy (fixed delay)
//! - [`BackoffPolicy`] exponential retry policy (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization strategy to avoid thundering herd
//! - [`RestartPolicy`] payload restart flags (on failure / on completion) and delay
//!
//! ## Quick wiring
//! ```text
//! ServiceConfig { max_retries, retry_delay, restart_on_failure, restart_on_completion, .. }
//!      ├─► ReconnectSupervisor uses:
//!      │     - RetryPolicy::next_delay(attempts, max_attempts) after each failed attempt
//!      └─► Lifecycle supervisor uses:
//!            - RestartPolicy::should_restart(&outcome) after each payload run
//! ```
//!
//! ## Defaults
//! - `ConstantDelay { delay: retry_delay }` (5s), unlimited attempts.
//! - `RestartPolicy` → restart on failure only, 15s delay.
//! - `JitterPolicy::None` by default; consider `Equal` for balanced randomness.

mod backoff;
mod jitter;
mod restart;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
pub use retry::{ConstantDelay, RetryDecision, RetryPolicy, RetryRef};
