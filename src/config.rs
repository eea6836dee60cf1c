//! # Service configuration.
//!
//! Provides [`EndpointConfig`] (where to connect) and [`ServiceConfig`]
//! (how to supervise the connection and the payload).
//!
//! Both are plain structs with public fields and a `Default`. Values can also
//! be loaded from the environment ([`ServiceConfig::from_env`]) or from an
//! endpoint URL ([`EndpointConfig::from_url`]).
//!
//! ## Sentinel values
//! - `connect_timeout = 0s` → unbounded connect attempt
//! - `max_retries = 0` → retry forever
//! - `setup_timeout = 0s` → setup waits as long as the retry policy allows
//!
//! ## Environment
//! | Variable        | Effect                                             |
//! |-----------------|----------------------------------------------------|
//! | `CONNECT_URL`   | endpoint URL, applied first (`wss://host:9000/ws`) |
//! | `CONNECT_HOST`  | host name or IP                                    |
//! | `CONNECT_PORT`  | TCP port                                           |
//! | `CONNECT_SSL`   | `1`/`true`/`yes`/`on` enable TLS                   |

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::policies::RestartPolicy;

/// Environment variable holding an endpoint URL.
pub const ENV_URL: &str = "CONNECT_URL";
/// Environment variable holding the host.
pub const ENV_HOST: &str = "CONNECT_HOST";
/// Environment variable holding the port.
pub const ENV_PORT: &str = "CONNECT_PORT";
/// Environment variable enabling TLS.
pub const ENV_SSL: &str = "CONNECT_SSL";

/// Where and how to open the transport.
///
/// Immutable once the service starts: the lifecycle supervisor clones it at
/// build time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Whether the transport should negotiate TLS.
    pub use_tls: bool,
    /// Bound for a single connection attempt (`0s` = unbounded).
    pub connect_timeout: Duration,
}

impl Default for EndpointConfig {
    /// `127.0.0.1:8080`, plain TCP, 10s connect timeout.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            use_tls: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    /// Creates a plain-TCP endpoint with the default connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns a copy with TLS enabled or disabled.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Returns a copy with a different connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the connect timeout as an `Option`.
    ///
    /// - `None` → the attempt is not bounded
    /// - `Some(d)` → the attempt is abandoned after `d`
    #[inline]
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout == Duration::ZERO {
            None
        } else {
            Some(self.connect_timeout)
        }
    }

    /// Parses an endpoint URL.
    ///
    /// `ws`, `http` and `tcp` schemes produce plain endpoints; `wss`, `https`
    /// and `tls` produce TLS endpoints. Web schemes fall back to ports 80/443,
    /// `tcp`/`tls` require an explicit port.
    ///
    /// # Example
    /// ```
    /// use linkvisor::EndpointConfig;
    ///
    /// let ep = EndpointConfig::from_url("wss://router.example.org/ws").unwrap();
    /// assert_eq!(ep.host, "router.example.org");
    /// assert_eq!(ep.port, 443);
    /// assert!(ep.use_tls);
    /// ```
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Url {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        let use_tls = match url.scheme() {
            "ws" | "http" | "tcp" => false,
            "wss" | "https" | "tls" => true,
            other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;
        // `port_or_known_default` knows ws/wss/http/https only.
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            use_tls,
            ..Self::default()
        })
    }
}

/// Configuration of one supervised service.
///
/// ## Field semantics
/// - `max_retries`: consecutive failed connection attempts before giving up (`0` = unlimited)
/// - `retry_delay`: delay of the default constant retry policy
/// - `restart_on_failure` / `restart_on_completion`: payload restart policy
/// - `restart_delay`: wait before a payload restart
/// - `join_timeout`: session handshake bound (used only with a session monitor)
/// - `setup_timeout`: bound for the whole setup phase (`0s` = unbounded)
/// - `grace`: how long a cancelled payload may take to exit before it is aborted
/// - `teardown_timeout`: total budget of the teardown sequence
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Service name, attached to every event.
    pub name: String,
    /// Endpoint to connect to.
    pub endpoint: EndpointConfig,
    /// Retry cap (`0` = unlimited).
    pub max_retries: u32,
    /// Delay between connection attempts for the default retry policy.
    pub retry_delay: Duration,
    /// Restart the payload after it fails.
    pub restart_on_failure: bool,
    /// Restart the payload after it completes normally.
    pub restart_on_completion: bool,
    /// Delay before a payload restart.
    pub restart_delay: Duration,
    /// Session handshake bound.
    pub join_timeout: Duration,
    /// Setup phase bound (`0s` = unbounded).
    pub setup_timeout: Duration,
    /// Grace period for a cancelled payload.
    pub grace: Duration,
    /// Total teardown budget.
    pub teardown_timeout: Duration,
    /// Event bus capacity.
    pub bus_capacity: usize,
}

impl Default for ServiceConfig {
    /// Default configuration:
    ///
    /// - unlimited retries, `retry_delay = 5s`
    /// - restart on failure only, `restart_delay = 15s`
    /// - `join_timeout = 10s`, no setup bound
    /// - `grace = 5s`, `teardown_timeout = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            endpoint: EndpointConfig::default(),
            max_retries: 0,
            retry_delay: Duration::from_secs(5),
            restart_on_failure: true,
            restart_on_completion: false,
            restart_delay: Duration::from_secs(15),
            join_timeout: Duration::from_secs(10),
            setup_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            teardown_timeout: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    /// Creates a default configuration for `endpoint`.
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Loads defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overrides endpoint fields from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overrides endpoint fields using `lookup` as the variable source.
    ///
    /// `CONNECT_URL` is applied first so the discrete variables can refine it.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_URL) {
            let parsed = EndpointConfig::from_url(&raw)?;
            self.endpoint = EndpointConfig {
                connect_timeout: self.endpoint.connect_timeout,
                ..parsed
            };
        }
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.is_empty()) {
            self.endpoint.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.endpoint.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                var: ENV_PORT.to_string(),
                value: port.clone(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(ssl) = lookup(ENV_SSL) {
            self.endpoint.use_tls = parse_flag(ENV_SSL, &ssl)?;
        }
        Ok(self)
    }

    /// Returns the retry cap as an `Option` (`None` = unlimited).
    #[inline]
    pub fn retry_limit(&self) -> Option<u32> {
        if self.max_retries == 0 {
            None
        } else {
            Some(self.max_retries)
        }
    }

    /// Returns the setup bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn setup_timeout(&self) -> Option<Duration> {
        if self.setup_timeout == Duration::ZERO {
            None
        } else {
            Some(self.setup_timeout)
        }
    }

    /// Returns the payload restart policy described by the restart fields.
    #[inline]
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            on_failure: self.restart_on_failure,
            on_completion: self.restart_on_completion,
            delay: self.restart_delay,
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var: var.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
