//! Session driver traits.
//!
//! This module defines the seam between the resilient connection logic and a
//! concrete database driver:
//!
//! - `SessionDriver` opens one physical session for a `ConnectTarget`
//! - `PhysicalSession` runs statements on an open session
//! - `DriverError` carries a structured `FailureKind` so fallback decisions
//!   never depend on parsing driver messages when the driver knows better

use async_trait::async_trait;
use std::fmt;

use super::row::{Params, Row};
use super::types::ConnectTarget;

/// Structured classification of a driver failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// TLS handshake, certificate or wallet failure
    Transport,
    /// Nothing listening, listener refused or unreachable port
    Listener,
    /// Credentials rejected or account unusable
    Authentication,
    /// An open session broke (end-of-file on channel, reset)
    SessionLost,
    /// The statement itself failed; the session is still usable
    Statement,
    /// The driver could not classify the failure
    Unclassified,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport failure",
            Self::Listener => "listener failure",
            Self::Authentication => "authentication failure",
            Self::SessionLost => "session lost",
            Self::Statement => "statement failure",
            Self::Unclassified => "driver error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by a [`SessionDriver`] or [`PhysicalSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub kind: FailureKind,
    /// Vendor error code (e.g. 12541 for ORA-12541), when known
    pub code: Option<i32>,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// An error the driver could not classify
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unclassified, message)
    }

    /// Effective failure kind.
    ///
    /// The driver's own classification wins; message matching is only used
    /// for `Unclassified` errors.
    pub fn effective_kind(&self) -> FailureKind {
        match self.kind {
            FailureKind::Unclassified => classify_message(&self.message),
            kind => kind,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DriverError {}

const TRANSPORT_MARKERS: &[&str] = &[
    "ssl",
    "tls",
    "handshake",
    "certificate",
    "wallet",
    "tcps",
    "ora-29024",
    "ora-28860",
    "ora-28759",
];

const LISTENER_MARKERS: &[&str] = &[
    "no listener",
    "listener",
    "connection refused",
    "refused",
    "could not resolve",
    "timed out",
    "timeout",
    "unreachable",
    "ora-12541",
    "ora-12170",
];

const SESSION_MARKERS: &[&str] = &[
    "end-of-file on communication channel",
    "not connected to oracle",
    "broken pipe",
    "connection reset",
    "ora-03113",
    "ora-03114",
];

const AUTH_MARKERS: &[&str] = &[
    "invalid username/password",
    "logon denied",
    "account is locked",
    "ora-01017",
    "ora-28000",
];

/// Last-resort classification of an unstructured driver message.
///
/// Precedence: session loss, authentication, transport, listener.
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if has(SESSION_MARKERS) {
        FailureKind::SessionLost
    } else if has(AUTH_MARKERS) {
        FailureKind::Authentication
    } else if has(TRANSPORT_MARKERS) {
        FailureKind::Transport
    } else if has(LISTENER_MARKERS) {
        FailureKind::Listener
    } else {
        FailureKind::Unclassified
    }
}

/// One open physical database session.
///
/// Dropping a session must release the underlying network resource; `close`
/// exists so callers can observe a graceful shutdown error. A session is not
/// reused after `close`.
#[async_trait]
pub trait PhysicalSession: Send {
    /// Execute a statement and return the affected row count.
    async fn execute(&mut self, statement: &str, params: &Params) -> Result<u64, DriverError>;

    /// Run a query and return all rows.
    async fn query(&mut self, statement: &str, params: &Params) -> Result<Vec<Row>, DriverError>;

    /// Server version banner.
    async fn server_version(&mut self) -> Result<String, DriverError>;

    /// Database user the session is authenticated as.
    async fn current_user(&mut self) -> Result<String, DriverError>;

    /// Close the session gracefully.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// A boxed physical session.
pub type BoxedSession = Box<dyn PhysicalSession>;

/// Opens physical sessions.
///
/// A driver makes exactly one attempt per `open` call; retry and fallback
/// belong to [`ResilientConnection`](crate::services::database::ResilientConnection).
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Short driver name for logs
    fn name(&self) -> &'static str;

    /// Open a session against the given target.
    async fn open(&self, target: &ConnectTarget) -> Result<BoxedSession, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_kind_wins_over_message() {
        let err = DriverError::new(FailureKind::Listener, "SSL handshake failed");
        assert_eq!(err.effective_kind(), FailureKind::Listener);
    }

    #[test]
    fn test_unclassified_falls_back_to_message() {
        assert_eq!(
            DriverError::unclassified("SSL handshake failed").effective_kind(),
            FailureKind::Transport
        );
        assert_eq!(
            DriverError::unclassified("ORA-12541: TNS:no listener").effective_kind(),
            FailureKind::Listener
        );
        assert_eq!(
            DriverError::unclassified("ORA-03113: end-of-file on communication channel")
                .effective_kind(),
            FailureKind::SessionLost
        );
        assert_eq!(
            DriverError::unclassified("ORA-01017: invalid username/password; logon denied")
                .effective_kind(),
            FailureKind::Authentication
        );
        assert_eq!(
            DriverError::unclassified("something odd").effective_kind(),
            FailureKind::Unclassified
        );
    }

    #[test]
    fn test_transport_checked_before_listener() {
        assert_eq!(
            classify_message("listener rejected TLS certificate"),
            FailureKind::Transport
        );
    }

    #[test]
    fn test_display_includes_kind() {
        let err = DriverError::new(FailureKind::Transport, "ORA-29024").with_code(29024);
        assert_eq!(err.to_string(), "transport failure: ORA-29024");
        assert_eq!(err.code, Some(29024));
    }
}
