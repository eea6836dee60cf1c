//! Error types used by the linkvisor runtime, its connectors and payloads.
//!
//! This module defines four enums:
//!
//! - [`ConnectError`]: the outcome of one failed connection attempt.
//! - [`PayloadError`]: errors raised by a payload run.
//! - [`ServiceError`]: errors surfaced by the lifecycle supervisor to callers.
//! - [`ConfigError`]: invalid configuration values (environment, URLs).
//!
//! All of them provide `as_label` for logs/metrics. [`ServiceError`] is `Clone`
//! so the final outcome of a run can be handed to every waiter.

use std::{io, time::Duration};
use thiserror::Error;

/// # Errors produced by a single connection attempt.
///
/// A connector makes exactly one bounded attempt; retrying is the reconnect
/// supervisor's business.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The remote endpoint actively refused the connection.
    #[error("connection refused by {endpoint}")]
    Refused {
        /// `host:port` of the endpoint.
        endpoint: String,
    },

    /// No response within the configured connect timeout.
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Any other I/O failure while connecting.
    #[error("transport error ({kind:?}): {reason}")]
    Transport {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Human-readable description.
        reason: String,
    },
}

impl ConnectError {
    /// Builds a [`ConnectError::Transport`] from an I/O error.
    pub fn transport(err: &io::Error) -> Self {
        ConnectError::Transport {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// Maps an I/O error raised while connecting to `endpoint`.
    ///
    /// `ConnectionRefused` becomes [`ConnectError::Refused`], `TimedOut` becomes
    /// [`ConnectError::Timeout`] with a zero bound (the OS gave up, not us),
    /// everything else is a transport error.
    pub fn from_io(endpoint: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::Refused {
                endpoint: endpoint.to_string(),
            },
            io::ErrorKind::TimedOut => ConnectError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: Duration::ZERO,
            },
            _ => ConnectError::transport(err),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Refused { .. } => "connection_refused",
            ConnectError::Timeout { .. } => "connect_timeout",
            ConnectError::Transport { .. } => "transport_error",
        }
    }
}

/// # Errors produced by payload execution.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Non-recoverable error; never restarted regardless of policy.
    #[error("fatal error (no restart): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// The run failed but may succeed if restarted.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The run observed cancellation and exited.
    #[error("context cancelled")]
    Canceled,
}

impl PayloadError {
    /// Shorthand for [`PayloadError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        PayloadError::Fail {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`PayloadError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        PayloadError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PayloadError::Fatal { .. } => "payload_fatal",
            PayloadError::Fail { .. } => "payload_failed",
            PayloadError::Canceled => "payload_canceled",
        }
    }

    /// Indicates whether a restart policy may restart after this error.
    ///
    /// # Example
    /// ```
    /// use linkvisor::PayloadError;
    ///
    /// assert!(PayloadError::fail("boom").is_restartable());
    /// assert!(!PayloadError::fatal("nope").is_restartable());
    /// ```
    pub fn is_restartable(&self) -> bool {
        matches!(self, PayloadError::Fail { .. })
    }
}

/// # Errors surfaced by the lifecycle supervisor.
///
/// [`ServiceError::Cancelled`] is not a failure: it is what an operation
/// interrupted by `stop()` reports.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The remote endpoint actively refused the connection.
    #[error("connection refused by {endpoint}")]
    ConnectionRefused {
        /// `host:port` of the endpoint.
        endpoint: String,
    },

    /// A connection attempt did not complete within its bound.
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Any other transport-level failure.
    #[error("transport error: {reason}")]
    TransportError {
        /// Human-readable description.
        reason: String,
    },

    /// The retry policy gave up.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of consecutive failed attempts.
        attempts: u32,
        /// The error of the final attempt.
        last: Box<ServiceError>,
    },

    /// The application-level handshake did not complete in time.
    #[error("session handshake not completed within {timeout:?}")]
    SessionTimeout {
        /// The configured join timeout.
        timeout: Duration,
    },

    /// Setup failed; wraps the setup-phase error.
    #[error("setup failed: {0}")]
    SetupFailed(Box<ServiceError>),

    /// Setup did not finish within the configured bound.
    #[error("setup did not complete within {timeout:?}")]
    SetupTimeout {
        /// The configured setup timeout.
        timeout: Duration,
    },

    /// A teardown step failed. Recorded, never fatal.
    #[error("teardown error: {reason}")]
    TeardownError {
        /// Human-readable description.
        reason: String,
    },

    /// The payload failed and the restart policy did not allow another run.
    #[error("payload failed: {0}")]
    PayloadFailed(PayloadError),

    /// `start()` was called while a run is still in progress.
    #[error("service already started")]
    AlreadyStarted,

    /// The dedicated runtime could not be built, or a runtime was already running.
    #[error("runtime error: {reason}")]
    Runtime {
        /// Human-readable description.
        reason: String,
    },

    /// The operation was interrupted by a stop request.
    #[error("operation cancelled")]
    Cancelled,
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use linkvisor::ServiceError;
    ///
    /// let err = ServiceError::SetupFailed(Box::new(ServiceError::Cancelled));
    /// assert_eq!(err.as_label(), "setup_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::ConnectionRefused { .. } => "connection_refused",
            ServiceError::ConnectTimeout { .. } => "connect_timeout",
            ServiceError::TransportError { .. } => "transport_error",
            ServiceError::RetriesExhausted { .. } => "retries_exhausted",
            ServiceError::SessionTimeout { .. } => "session_timeout",
            ServiceError::SetupFailed(_) => "setup_failed",
            ServiceError::SetupTimeout { .. } => "setup_timeout",
            ServiceError::TeardownError { .. } => "teardown_error",
            ServiceError::PayloadFailed(_) => "payload_failed",
            ServiceError::AlreadyStarted => "already_started",
            ServiceError::Runtime { .. } => "runtime_error",
            ServiceError::Cancelled => "cancelled",
        }
    }

    /// True for the deliberate-shutdown outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }

    /// Unwraps [`ServiceError::SetupFailed`] layers and returns the root cause.
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::SetupFailed(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<ConnectError> for ServiceError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Refused { endpoint } => ServiceError::ConnectionRefused { endpoint },
            ConnectError::Timeout { endpoint, timeout } => {
                ServiceError::ConnectTimeout { endpoint, timeout }
            }
            ConnectError::Transport { reason, .. } => ServiceError::TransportError { reason },
        }
    }
}

/// # Invalid configuration values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An endpoint URL could not be turned into an endpoint.
    #[error("invalid endpoint url {url:?}: {reason}")]
    Url {
        /// Offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Invalid { .. } => "config_invalid",
            ConfigError::Url { .. } => "config_url",
        }
    }
}
