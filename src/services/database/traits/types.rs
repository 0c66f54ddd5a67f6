//! Connection configuration types.
//!
//! This module contains:
//! - `TransportMode` - Secure (`tcps`) or plain (`tcp`) session transport
//! - `RetryPolicy` - Retry budget and wait model for a connect cycle
//! - `ConnectionConfig` - Validated, immutable endpoint description
//! - `ConnectTarget` - The concrete endpoint used by a single attempt

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::services::database::error::{Error, Result};

/// Default listener port for TCPS sessions
pub const DEFAULT_SECURE_PORT: u16 = 2484;

/// Default listener port for plain TCP sessions
pub const DEFAULT_PLAIN_PORT: u16 = 1521;

/// Transport security mode for the database session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Encrypted session (`tcps`)
    #[default]
    Secure,
    /// Unencrypted session (`tcp`)
    Plain,
}

impl TransportMode {
    /// Protocol name used in connect descriptors
    pub fn protocol(&self) -> &'static str {
        match self {
            Self::Secure => "tcps",
            Self::Plain => "tcp",
        }
    }

    /// Parse from a configuration value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tcps" | "secure" | "ssl" | "tls" => Some(Self::Secure),
            "tcp" | "plain" | "none" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Whether this mode encrypts the session
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Secure)
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol())
    }
}

/// Wait model between connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Wait the configured retry delay before every retry
    #[default]
    Linear,
    /// Double the delay after each retry, never exceeding `max_delay`
    Exponential { max_delay: Duration },
}

/// Retry budget for one connect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub retry_count: u32,
    /// Base wait between attempts
    pub retry_delay: Duration,
    /// Wait model
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Total attempts a cycle may make (initial attempt included)
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.retry_delay,
            Backoff::Exponential { max_delay } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.retry_delay.saturating_mul(factor).min(max_delay)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_secs(2),
            backoff: Backoff::Linear,
        }
    }
}

/// Password that is usable internally but redacted in diagnostic output.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const REDACTED: &'static str = "********";

    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// The cleartext value, for handing to the driver
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::REDACTED)
    }
}

/// Immutable description of an Oracle endpoint.
///
/// Construct through [`ConnectionConfig::builder`] or
/// [`ConnectionConfig::from_env_map`]; both validate
/// once at the boundary, so a value of this type is always usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    service_name: String,
    username: String,
    password: Password,
    transport_mode: TransportMode,
    verify_identity: bool,
    connect_timeout: Duration,
    retry: RetryPolicy,
    fallback_port: Option<u16>,
    /// Raw key/value pairs this config was loaded from, password excluded
    env_source: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Start building a configuration
    pub fn builder(
        host: impl Into<String>,
        service_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            host: host.into(),
            port: DEFAULT_SECURE_PORT,
            service_name: service_name.into(),
            username: username.into(),
            password: password.into(),
            transport_mode: TransportMode::Secure,
            verify_identity: true,
            connect_timeout: Duration::from_secs(30),
            retry_count: i64::from(RetryPolicy::default().retry_count),
            retry_delay: RetryPolicy::default().retry_delay,
            backoff: Backoff::Linear,
            fallback_port: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.transport_mode
    }

    pub fn verify_identity(&self) -> bool {
        self.verify_identity
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn fallback_port(&self) -> Option<u16> {
        self.fallback_port
    }

    /// Endpoint for the first attempt of a connect cycle.
    pub fn initial_target(&self) -> ConnectTarget {
        ConnectTarget {
            host: self.host.clone(),
            port: self.port,
            service_name: self.service_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            transport_mode: self.transport_mode,
            verify_identity: self.verify_identity,
            connect_timeout: self.connect_timeout,
        }
    }

    pub(crate) fn with_env_source(mut self, source: BTreeMap<String, String>) -> Self {
        self.env_source = source;
        self
    }

    pub(crate) fn env_source(&self) -> &BTreeMap<String, String> {
        &self.env_source
    }

    /// Display string in the form `user@host:port/service`
    pub fn display_name(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.service_name
        )
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    host: String,
    port: u16,
    service_name: String,
    username: String,
    password: String,
    transport_mode: TransportMode,
    verify_identity: bool,
    connect_timeout: Duration,
    retry_count: i64,
    retry_delay: Duration,
    backoff: Backoff,
    fallback_port: Option<u16>,
}

impl ConnectionConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = mode;
        self
    }

    pub fn verify_identity(mut self, verify: bool) -> Self {
        self.verify_identity = verify;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Retries after the initial attempt. Negative values fail `build()`.
    pub fn retry_count(mut self, count: i64) -> Self {
        self.retry_count = count;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn fallback_port(mut self, port: Option<u16>) -> Self {
        self.fallback_port = port;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ConnectionConfig> {
        let required = [
            ("host", &self.host),
            ("service name", &self.service_name),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::configuration(format!("{} must not be empty", field)));
            }
        }
        if self.retry_count < 0 {
            return Err(Error::configuration(format!(
                "retry count must be >= 0, got {}",
                self.retry_count
            )));
        }
        let retry_count = u32::try_from(self.retry_count).map_err(|_| {
            Error::configuration(format!("retry count {} is too large", self.retry_count))
        })?;
        if self.port == 0 {
            return Err(Error::configuration("port must be non-zero"));
        }

        Ok(ConnectionConfig {
            host: self.host,
            port: self.port,
            service_name: self.service_name,
            username: self.username,
            password: Password::new(self.password),
            transport_mode: self.transport_mode,
            verify_identity: self.verify_identity,
            connect_timeout: self.connect_timeout,
            retry: RetryPolicy {
                retry_count,
                retry_delay: self.retry_delay,
                backoff: self.backoff,
            },
            fallback_port: self.fallback_port.filter(|p| *p != 0),
            env_source: BTreeMap::new(),
        })
    }
}

/// The concrete endpoint a single connection attempt uses.
///
/// Starts as a copy of the configuration and is mutated by the fallback
/// policy during a connect cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: Password,
    pub transport_mode: TransportMode,
    pub verify_identity: bool,
    pub connect_timeout: Duration,
}

impl ConnectTarget {
    /// Render an Easy Connect Plus descriptor for this target.
    pub fn easy_connect_string(&self) -> String {
        let mut descriptor = format!(
            "{}://{}:{}/{}",
            self.transport_mode.protocol(),
            self.host,
            self.port,
            self.service_name
        );

        let mut options = Vec::new();
        if self.transport_mode.is_secure() {
            options.push(format!(
                "ssl_server_dn_match={}",
                if self.verify_identity { "on" } else { "off" }
            ));
        }
        if !self.connect_timeout.is_zero() {
            options.push(format!(
                "connect_timeout={}",
                self.connect_timeout.as_secs().max(1)
            ));
        }
        if !options.is_empty() {
            descriptor.push('?');
            descriptor.push_str(&options.join("&"));
        }
        descriptor
    }
}
