//! Error types for the connection layer.
//!
//! Errors are grouped into categories so callers can tell configuration
//! mistakes apart from transient connection failures and statement errors.
//! Only [`ResilientConnection`](super::ResilientConnection) acts on
//! retriability; everything above it treats a terminal failure as opaque.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::traits::DriverError;

/// Result type for connection-layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid or missing connection settings (fatal)
    Configuration,
    /// Network, listener, handshake or authentication failure
    Connection,
    /// Operation attempted without an open session
    NotConnected,
    /// Statement-level failure on an open session
    Query,
    /// Caller-supplied deadline expired
    Timeout,
    /// The caller dropped a connect cycle before it finished
    Cancelled,
}

impl ErrorCategory {
    /// Whether errors in this category are retried by the connection layer
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Terminal outcome of a connect cycle that exhausted its retry budget.
#[derive(Debug, Clone)]
pub struct ConnectFailure {
    /// Attempts made in the cycle (initial attempt included)
    pub attempts: u32,
    /// The cycle switched from `tcps` to `tcp`
    pub transport_fallback: bool,
    /// The cycle switched to the fallback port
    pub port_fallback: Option<u16>,
    /// Error reported by the final attempt
    pub last_error: DriverError,
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed after {} attempt{} (fallbacks tried: {}): {}",
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            fallbacks_tried(&self.transport_fallback, &self.port_fallback),
            self.last_error
        )
    }
}

/// Human readable list of the fallbacks a connect cycle switched to.
fn fallbacks_tried(transport_fallback: &bool, port_fallback: &Option<u16>) -> String {
    let mut tried = Vec::new();
    if *transport_fallback {
        tried.push("plain transport".to_string());
    }
    if let Some(port) = port_fallback {
        tried.push(format!("port {}", port));
    }
    if tried.is_empty() {
        "none".to_string()
    } else {
        tried.join(", ")
    }
}

/// Main error type for the connection layer
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Connection settings failed validation
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A required configuration key was not supplied
    #[error("missing required configuration key `{key}`")]
    MissingConfig { key: String },

    /// Every connection attempt in the cycle failed
    #[error("connection error: {0}")]
    Connection(ConnectFailure),

    /// The session is not open
    #[error("not connected: call connect() before issuing statements")]
    NotConnected,

    /// Statement failed on an open session
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        /// The session itself broke and was closed
        connection_fatal: bool,
    },

    /// The overall deadline given to `connect_within` expired
    #[error(
        "connect timed out after {elapsed:?} ({attempts} attempts started, fallbacks tried: {})",
        fallbacks_tried(.transport_fallback, .port_fallback)
    )]
    Timeout {
        elapsed: Duration,
        attempts: u32,
        transport_fallback: bool,
        port_fallback: Option<u16>,
    },

    /// A connect cycle was dropped by its caller before it settled
    #[error(
        "connect cancelled after {attempts} attempts started (fallbacks tried: {})",
        fallbacks_tried(.transport_fallback, .port_fallback)
    )]
    Cancelled {
        attempts: u32,
        transport_fallback: bool,
        port_fallback: Option<u16>,
    },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } | Self::MissingConfig { .. } => {
                ErrorCategory::Configuration
            }
            Self::Connection(_) => ErrorCategory::Connection,
            Self::NotConnected => ErrorCategory::NotConnected,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Whether a query failure also closed the session
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Query {
                connection_fatal: true,
                ..
            }
        )
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a missing-key error
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// Create a query error from a driver failure
    pub fn query(source: &DriverError, sql: &str, connection_fatal: bool) -> Self {
        Self::Query {
            message: source.to_string(),
            sql: Some(sql.to_string()),
            connection_fatal,
        }
    }
}
