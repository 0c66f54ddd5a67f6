//! Resilient connection state machine.
//!
//! A `ResilientConnection` owns at most one physical session. `connect()`
//! runs a bounded cycle of attempts against a [`SessionDriver`], applying
//! two sticky fallbacks along the way:
//!
//! - a transport failure on a secure session switches the cycle to plain
//!   `tcp` with identity verification off
//! - a listener failure switches the cycle to the configured fallback port
//!
//! Every operation takes `&mut self`, so operations on one connection are
//! serialized by construction. Share one through
//! [`ConnectionManager`](super::ConnectionManager).

use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::error::{ConnectFailure, Error, Result};
use super::traits::{
    BoxedSession, ConnectTarget, ConnectionConfig, DriverError, FailureKind, Params, Row,
    SessionDriver, TransportMode,
};

/// Lifecycle state of a [`ResilientConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session; `connect()` has not run or `disconnect()` was called
    #[default]
    Closed,
    /// A connect cycle is in progress
    Connecting,
    /// A session is open and usable
    Open,
    /// The last connect cycle failed, or an open session was lost
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ResilientConnection::test_connection`].
///
/// Never carries the password.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTestReport {
    pub success: bool,
    /// Transport the session ended up on
    pub transport_mode_used: Option<TransportMode>,
    /// Port the session ended up on
    pub port_used: Option<u16>,
    pub server_version: Option<String>,
    pub current_user: Option<String>,
    pub elapsed_ms: u128,
    pub attempts_used: u32,
    pub fallback_applied: bool,
    pub error: Option<String>,
}

/// Point-in-time view of a connection, safe to log or serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub id: Uuid,
    pub state: ConnectionState,
    /// Attempts made by the most recent connect cycle
    pub attempts: u32,
    pub transport_fallback: bool,
    pub port_fallback: Option<u16>,
    pub active_transport_mode: Option<TransportMode>,
    pub active_port: Option<u16>,
    pub last_error: Option<String>,
}

/// A database session with bounded retry and transport/port fallback.
pub struct ResilientConnection {
    id: Uuid,
    config: ConnectionConfig,
    driver: Arc<dyn SessionDriver>,
    state: ConnectionState,
    session: Option<BoxedSession>,
    active_target: Option<ConnectTarget>,
    attempts: u32,
    transport_fallback: bool,
    port_fallback: Option<u16>,
    last_error: Option<Error>,
}

impl ResilientConnection {
    /// Create a closed connection. No I/O happens until `connect()`.
    pub fn new(config: ConnectionConfig, driver: Arc<dyn SessionDriver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            driver,
            state: ConnectionState::Closed,
            session: None,
            active_target: None,
            attempts: 0,
            transport_fallback: false,
            port_fallback: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open && self.session.is_some()
    }

    /// Whether the most recent connect cycle switched transport or port
    pub fn fallback_applied(&self) -> bool {
        self.transport_fallback || self.port_fallback.is_some()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Endpoint of the open session, if any
    pub fn active_target(&self) -> Option<&ConnectTarget> {
        self.active_target.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            id: self.id,
            state: self.state,
            attempts: self.attempts,
            transport_fallback: self.transport_fallback,
            port_fallback: self.port_fallback,
            active_transport_mode: self.active_target.as_ref().map(|t| t.transport_mode),
            active_port: self.active_target.as_ref().map(|t| t.port),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    /// Open a session, retrying up to the configured budget.
    ///
    /// Returns immediately when a session is already open. Makes exactly
    /// `retry_count + 1` attempts before failing with
    /// [`Error::Connection`]; the connection is then `Failed` and holds no
    /// session. Dropping the returned future mid-cycle also leaves the
    /// connection `Failed`, with [`Error::Cancelled`] as its last error.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        self.reset_cycle();
        self.state = ConnectionState::Connecting;

        let mut cycle = CycleGuard { conn: self };
        cycle.run_cycle().await
    }

    async fn run_cycle(&mut self) -> Result<()> {
        let policy = *self.config.retry_policy();
        let mut target = self.config.initial_target();

        tracing::info!(
            connection = %self.id,
            driver = self.driver.name(),
            "Connecting to {} over {} (max {} attempts)",
            self.config.display_name(),
            target.transport_mode,
            policy.max_attempts()
        );

        loop {
            self.attempts += 1;
            let attempt = self.attempts;
            let started = Instant::now();

            tracing::debug!(
                connection = %self.id,
                "Attempt {}/{}: {}://{}:{}",
                attempt,
                policy.max_attempts(),
                target.transport_mode,
                target.host,
                target.port
            );

            match self.driver.open(&target).await {
                Ok(session) => {
                    tracing::info!(
                        connection = %self.id,
                        "Connected on attempt {} over {} port {} in {}ms",
                        attempt,
                        target.transport_mode,
                        target.port,
                        started.elapsed().as_millis()
                    );
                    self.session = Some(session);
                    self.active_target = Some(target);
                    self.state = ConnectionState::Open;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        connection = %self.id,
                        kind = %err.effective_kind(),
                        "Attempt {}/{} failed: {}",
                        attempt,
                        policy.max_attempts(),
                        err
                    );

                    if attempt >= policy.max_attempts() {
                        return Err(self.fail_cycle(err));
                    }

                    self.apply_fallback(&mut target, &err);

                    let delay = policy.delay_before_retry(attempt);
                    if !delay.is_zero() {
                        tracing::debug!(connection = %self.id, "Retrying in {:?}", delay);
                        smol::Timer::after(delay).await;
                    }
                }
            }
        }
    }

    /// Like [`connect`](Self::connect), bounded by an overall deadline.
    ///
    /// When the deadline expires the in-flight attempt is dropped along with
    /// any session it was establishing, and the connection ends `Failed`.
    pub async fn connect_within(&mut self, deadline: Duration) -> Result<()> {
        let started = Instant::now();

        let outcome = {
            let connect = self.connect();
            let expired = async {
                smol::Timer::after(deadline).await;
                None
            };
            smol::future::or(async { Some(connect.await) }, expired).await
        };

        match outcome {
            Some(result) => result,
            None => {
                self.session = None;
                self.active_target = None;
                self.state = ConnectionState::Failed;
                let err = Error::Timeout {
                    elapsed: started.elapsed(),
                    attempts: self.attempts,
                    transport_fallback: self.transport_fallback,
                    port_fallback: self.port_fallback,
                };
                tracing::warn!(connection = %self.id, "{}", err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Close the session if one is open. Always ends `Closed`.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(connection = %self.id, "Error closing session: {}", e);
            }
            tracing::info!(connection = %self.id, "Disconnected from {}", self.config.display_name());
        }
        self.active_target = None;
        self.state = ConnectionState::Closed;
        Ok(())
    }

    /// Execute a statement and return the affected row count.
    pub async fn execute(&mut self, statement: &str, params: &Params) -> Result<u64> {
        let session = self.open_session()?;
        let result = session.execute(statement, params).await;
        self.settle(result, statement)
    }

    /// Run a query and return all rows.
    pub async fn query(&mut self, statement: &str, params: &Params) -> Result<Vec<Row>> {
        let session = self.open_session()?;
        let result = session.query(statement, params).await;
        self.settle(result, statement)
    }

    /// Connect if needed and report what the session looks like.
    ///
    /// A session opened only for the test is closed again afterwards.
    pub async fn test_connection(&mut self) -> ConnectionTestReport {
        self.run_test(None).await
    }

    /// Like [`test_connection`](Self::test_connection), with the connect
    /// bounded by `deadline`. An expired deadline is reported as a failed
    /// test rather than returned.
    pub async fn test_connection_within(&mut self, deadline: Duration) -> ConnectionTestReport {
        self.run_test(Some(deadline)).await
    }

    async fn run_test(&mut self, deadline: Option<Duration>) -> ConnectionTestReport {
        let started = Instant::now();
        let was_open = self.is_open();

        let mut report = ConnectionTestReport {
            success: false,
            transport_mode_used: None,
            port_used: None,
            server_version: None,
            current_user: None,
            elapsed_ms: 0,
            attempts_used: 0,
            fallback_applied: false,
            error: None,
        };

        let connected = match deadline {
            Some(deadline) => self.connect_within(deadline).await,
            None => self.connect().await,
        };

        match connected {
            Ok(()) => {
                report.transport_mode_used = self.active_target.as_ref().map(|t| t.transport_mode);
                report.port_used = self.active_target.as_ref().map(|t| t.port);

                match self.probe().await {
                    Ok((version, user)) => {
                        report.server_version = Some(version);
                        report.current_user = Some(user);
                        report.success = true;
                    }
                    Err(e) => report.error = Some(e.to_string()),
                }

                // A probe that lost the session has already left us `Failed`.
                if !was_open && self.is_open() {
                    let _ = self.disconnect().await;
                }
            }
            Err(e) => report.error = Some(e.to_string()),
        }

        report.attempts_used = self.attempts;
        report.fallback_applied = self.fallback_applied();
        report.elapsed_ms = started.elapsed().as_millis();

        tracing::info!(
            connection = %self.id,
            success = report.success,
            "Connection test finished in {}ms after {} attempt(s)",
            report.elapsed_ms,
            report.attempts_used
        );
        report
    }

    async fn probe(&mut self) -> Result<(String, String)> {
        let session = self.open_session()?;
        let version = session.server_version().await;
        let version = self.settle(version, "server version")?;

        let session = self.open_session()?;
        let user = session.current_user().await;
        let user = self.settle(user, "current user")?;

        Ok((version, user))
    }

    fn open_session(&mut self) -> Result<&mut BoxedSession> {
        if self.state != ConnectionState::Open {
            return Err(Error::NotConnected);
        }
        self.session.as_mut().ok_or(Error::NotConnected)
    }

    /// Map a driver result, dropping the session when it was lost.
    fn settle<T>(&mut self, result: std::result::Result<T, DriverError>, statement: &str) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let fatal = err.effective_kind() == FailureKind::SessionLost;
                let error = Error::query(&err, statement, fatal);
                if fatal {
                    tracing::error!(connection = %self.id, "Session lost: {}", err);
                    self.session = None;
                    self.active_target = None;
                    self.state = ConnectionState::Failed;
                    self.last_error = Some(error.clone());
                } else {
                    tracing::debug!(connection = %self.id, "Statement failed: {}", err);
                }
                Err(error)
            }
        }
    }

    fn reset_cycle(&mut self) {
        self.session = None;
        self.active_target = None;
        self.attempts = 0;
        self.transport_fallback = false;
        self.port_fallback = None;
        self.last_error = None;
    }

    fn fail_cycle(&mut self, last_error: DriverError) -> Error {
        let err = Error::Connection(ConnectFailure {
            attempts: self.attempts,
            transport_fallback: self.transport_fallback,
            port_fallback: self.port_fallback,
            last_error,
        });
        tracing::error!(connection = %self.id, "Giving up on {}: {}", self.config.display_name(), err);
        self.state = ConnectionState::Failed;
        self.last_error = Some(err.clone());
        err
    }

    /// Adjust the target for the next attempt. Each fallback applies at most
    /// once per cycle and stays applied.
    fn apply_fallback(&mut self, target: &mut ConnectTarget, err: &DriverError) {
        match err.effective_kind() {
            FailureKind::Transport if target.transport_mode.is_secure() && !self.transport_fallback => {
                tracing::info!(
                    connection = %self.id,
                    "Secure transport failed, falling back to plain tcp without identity verification"
                );
                target.transport_mode = TransportMode::Plain;
                target.verify_identity = false;
                self.transport_fallback = true;
            }
            FailureKind::Listener if self.port_fallback.is_none() => {
                if let Some(port) = self.config.fallback_port().filter(|p| *p != target.port) {
                    tracing::info!(
                        connection = %self.id,
                        "Listener unreachable on port {}, falling back to port {}",
                        target.port,
                        port
                    );
                    target.port = port;
                    self.port_fallback = Some(port);
                }
            }
            _ => {}
        }
    }
}

/// Holds a connection for the length of one connect cycle. If the cycle's
/// future is dropped while still `Connecting`, the connection is marked
/// `Failed` and any half-built session has already been released.
struct CycleGuard<'a> {
    conn: &'a mut ResilientConnection,
}

impl Deref for CycleGuard<'_> {
    type Target = ResilientConnection;

    fn deref(&self) -> &ResilientConnection {
        self.conn
    }
}

impl DerefMut for CycleGuard<'_> {
    fn deref_mut(&mut self) -> &mut ResilientConnection {
        self.conn
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let conn = &mut *self.conn;
        if conn.state != ConnectionState::Connecting {
            return;
        }

        conn.session = None;
        conn.active_target = None;
        conn.state = ConnectionState::Failed;
        let err = Error::Cancelled {
            attempts: conn.attempts,
            transport_fallback: conn.transport_fallback,
            port_fallback: conn.port_fallback,
        };
        tracing::warn!(connection = %conn.id, "{}", err);
        conn.last_error = Some(err);
    }
}

impl fmt::Debug for ResilientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientConnection")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("driver", &self.driver.name())
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::testing::{ScriptedDriver, refused, tls_failure};
    use crate::services::database::traits::{DEFAULT_PLAIN_PORT, Value};

    fn config(retry_count: i64, fallback_port: Option<u16>) -> ConnectionConfig {
        ConnectionConfig::builder("wms-db.internal", "WMSPDB", "loader", "s3cret")
            .retry_count(retry_count)
            .retry_delay(Duration::ZERO)
            .fallback_port(fallback_port)
            .build()
            .unwrap()
    }

    fn connection(config: ConnectionConfig, driver: &Arc<ScriptedDriver>) -> ResilientConnection {
        ResilientConnection::new(config, driver.clone())
    }

    #[test]
    fn test_new_connection_is_closed_without_io() {
        let driver = Arc::new(ScriptedDriver::succeeding());
        let conn = connection(config(3, None), &driver);

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.is_open());
        assert_eq!(driver.attempts(), 0);
    }

    #[test]
    fn test_connect_success_first_attempt() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);

            conn.connect().await.unwrap();

            assert_eq!(conn.state(), ConnectionState::Open);
            assert_eq!(driver.attempts(), 1);
            assert!(!conn.fallback_applied());
            assert_eq!(driver.live_sessions(), 1);
        });
    }

    #[test]
    fn test_connect_is_idempotent_when_open() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);

            conn.connect().await.unwrap();
            conn.connect().await.unwrap();

            assert_eq!(driver.attempts(), 1);
            assert_eq!(driver.live_sessions(), 1);
        });
    }

    #[test]
    fn test_exhausts_exactly_retry_count_plus_one_attempts() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(refused()));
            let mut conn = connection(config(3, None), &driver);

            let err = conn.connect().await.unwrap_err();

            assert_eq!(driver.attempts(), 4);
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert_eq!(driver.live_sessions(), 0);
            match &err {
                Error::Connection(failure) => {
                    assert_eq!(failure.attempts, 4);
                    assert_eq!(failure.last_error.kind, FailureKind::Listener);
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(conn.last_error().is_some());
        });
    }

    #[test]
    fn test_zero_retries_makes_one_attempt() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(refused()));
            let mut conn = connection(config(0, Some(DEFAULT_PLAIN_PORT)), &driver);

            assert!(conn.connect().await.is_err());
            assert_eq!(driver.attempts(), 1);
        });
    }

    #[test]
    fn test_transport_fallback_is_sticky() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::scripted(
                vec![Err(tls_failure()), Err(refused())],
                Ok(()),
            ));
            let mut conn = connection(config(3, None), &driver);

            conn.connect().await.unwrap();

            let targets = driver.targets();
            assert_eq!(targets.len(), 3);
            assert_eq!(targets[0].transport_mode, TransportMode::Secure);
            assert!(targets[0].verify_identity);
            for target in &targets[1..] {
                assert_eq!(target.transport_mode, TransportMode::Plain);
                assert!(!target.verify_identity);
            }
            assert!(conn.fallback_applied());
            assert_eq!(
                conn.active_target().map(|t| t.transport_mode),
                Some(TransportMode::Plain)
            );
        });
    }

    #[test]
    fn test_port_fallback_is_sticky() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::scripted(
                vec![Err(refused()), Err(tls_failure()), Err(refused())],
                Ok(()),
            ));
            let mut conn = connection(config(4, Some(DEFAULT_PLAIN_PORT)), &driver);

            conn.connect().await.unwrap();

            let ports: Vec<u16> = driver.targets().iter().map(|t| t.port).collect();
            assert_eq!(ports, vec![2484, 1521, 1521, 1521]);
            assert_eq!(conn.status().port_fallback, Some(1521));
            assert_eq!(conn.status().active_port, Some(1521));
        });
    }

    #[test]
    fn test_listener_failure_without_fallback_port_keeps_port() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(refused()));
            let mut conn = connection(config(2, None), &driver);

            let err = conn.connect().await.unwrap_err();

            assert!(driver.targets().iter().all(|t| t.port == 2484));
            assert!(err.to_string().contains("fallbacks tried: none"));
        });
    }

    #[test]
    fn test_failure_message_names_fallbacks() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::scripted(
                vec![Err(tls_failure())],
                Err(refused()),
            ));
            let mut conn = connection(config(2, Some(1521)), &driver);

            let err = conn.connect().await.unwrap_err();
            let message = err.to_string();

            assert!(message.contains("3 attempts"), "{message}");
            assert!(message.contains("plain transport"), "{message}");
            assert!(message.contains("port 1521"), "{message}");
        });
    }

    #[test]
    fn test_new_cycle_resets_fallbacks() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::scripted(vec![Err(tls_failure())], Ok(())));
            let mut conn = connection(config(3, None), &driver);

            conn.connect().await.unwrap();
            conn.disconnect().await.unwrap();
            conn.connect().await.unwrap();

            let targets = driver.targets();
            assert_eq!(targets.len(), 3);
            assert_eq!(targets[2].transport_mode, TransportMode::Secure);
            assert!(!conn.fallback_applied());
        });
    }

    #[test]
    fn test_operations_before_connect_fail_without_io() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);

            let err = conn.execute("DELETE FROM wave", &Params::None).await.unwrap_err();
            assert!(matches!(err, Error::NotConnected));

            let err = conn.query("SELECT 1 FROM dual", &Params::None).await.unwrap_err();
            assert!(matches!(err, Error::NotConnected));

            assert_eq!(driver.attempts(), 0);
            assert!(driver.statements().is_empty());
        });
    }

    #[test]
    fn test_execute_and_query_on_open_session() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();

            let affected = conn
                .execute(
                    "UPDATE wave SET status = :1 WHERE wave_id = :2",
                    &Params::positional([Value::from("RELEASED"), Value::from(7i64)]),
                )
                .await
                .unwrap();
            assert_eq!(affected, 2);

            let rows = conn.query("SELECT 1 FROM dual", &Params::None).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(
                rows[0].get("statement").and_then(Value::as_str),
                Some("SELECT 1 FROM dual")
            );
        });
    }

    #[test]
    fn test_statement_failure_keeps_session_open() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();

            let err = conn.execute("INSERT FAIL_STATEMENT", &Params::None).await.unwrap_err();

            assert!(matches!(err, Error::Query { connection_fatal: false, .. }));
            assert_eq!(conn.state(), ConnectionState::Open);
            assert!(conn.execute("COMMIT", &Params::None).await.is_ok());
        });
    }

    #[test]
    fn test_session_loss_moves_to_failed() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();

            let err = conn.query("SELECT DROP_SESSION FROM dual", &Params::None).await.unwrap_err();

            assert!(err.is_connection_fatal());
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert_eq!(driver.live_sessions(), 0);
            assert!(matches!(
                conn.execute("COMMIT", &Params::None).await,
                Err(Error::NotConnected)
            ));

            conn.connect().await.unwrap();
            assert_eq!(conn.state(), ConnectionState::Open);
        });
    }

    #[test]
    fn test_unclassified_session_loss_detected_from_message() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(0, None), &driver);
            conn.connect().await.unwrap();

            let err = conn.execute("UNCLASSIFIED_EOF", &Params::None).await.unwrap_err();

            assert!(err.is_connection_fatal());
            assert_eq!(conn.state(), ConnectionState::Failed);
        });
    }

    #[test]
    fn test_disconnect_releases_session() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();

            conn.disconnect().await.unwrap();

            assert_eq!(conn.state(), ConnectionState::Closed);
            assert_eq!(driver.live_sessions(), 0);
            assert_eq!(driver.closed_gracefully(), 1);

            conn.disconnect().await.unwrap();
            assert_eq!(conn.state(), ConnectionState::Closed);
        });
    }

    #[test]
    fn test_drop_releases_session() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();
            assert_eq!(driver.live_sessions(), 1);

            drop(conn);
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connect_within_deadline_expires() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(tls_failure()));
            let config = ConnectionConfig::builder("wms-db.internal", "WMSPDB", "loader", "s3cret")
                .retry_count(100)
                .retry_delay(Duration::from_millis(40))
                .build()
                .unwrap();
            let mut conn = ResilientConnection::new(config, driver.clone());

            let err = conn.connect_within(Duration::from_millis(100)).await.unwrap_err();

            match &err {
                Error::Timeout {
                    attempts,
                    transport_fallback,
                    port_fallback,
                    ..
                } => {
                    assert!(*attempts >= 1 && *attempts < 101);
                    assert!(*transport_fallback);
                    assert_eq!(*port_fallback, None);
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(err.to_string().contains("plain transport"), "{err}");
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_dropped_connect_leaves_failed() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::hanging());
            let mut conn = connection(config(0, None), &driver);

            let finished = smol::future::or(async { Some(conn.connect().await) }, async {
                smol::Timer::after(Duration::from_millis(30)).await;
                None
            })
            .await;

            assert!(finished.is_none());
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert!(matches!(
                conn.last_error(),
                Some(Error::Cancelled { attempts: 1, .. })
            ));
            assert!(conn.status().last_error.unwrap().contains("cancelled"));
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_completed_connect_is_not_marked_cancelled() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(refused()));
            let mut conn = connection(config(1, None), &driver);

            assert!(conn.connect().await.is_err());

            assert!(matches!(conn.last_error(), Some(Error::Connection(_))));
        });
    }

    #[test]
    fn test_connect_within_drops_half_open_session() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::hanging());
            let mut conn = connection(config(0, None), &driver);

            let err = conn.connect_within(Duration::from_millis(30)).await.unwrap_err();

            assert!(matches!(err, Error::Timeout { .. }));
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connect_within_succeeds_before_deadline() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);

            conn.connect_within(Duration::from_secs(5)).await.unwrap();
            assert!(conn.is_open());
        });
    }

    #[test]
    fn test_connection_report_success() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::scripted(vec![Err(tls_failure())], Ok(())));
            let mut conn = connection(config(3, None), &driver);

            let report = conn.test_connection().await;

            assert!(report.success, "{:?}", report.error);
            assert_eq!(report.attempts_used, 2);
            assert!(report.fallback_applied);
            assert_eq!(report.transport_mode_used, Some(TransportMode::Plain));
            assert_eq!(report.current_user.as_deref(), Some("LOADER"));
            assert!(report.server_version.unwrap().contains("Oracle"));
            assert_eq!(conn.state(), ConnectionState::Closed);
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connection_report_failure_omits_password() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::failing(refused()));
            let mut conn = connection(config(1, None), &driver);

            let report = conn.test_connection().await;

            assert!(!report.success);
            assert_eq!(report.attempts_used, 2);
            let json = serde_json::to_string(&report).unwrap();
            assert!(!json.contains("s3cret"));
            assert!(json.contains("\"success\":false"));
        });
    }

    #[test]
    fn test_connection_report_keeps_session_loss_visible() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let config = ConnectionConfig::builder("wms-db.internal", "WMSPDB", "drop_session", "s3cret")
                .retry_delay(Duration::ZERO)
                .build()
                .unwrap();
            let mut conn = ResilientConnection::new(config, driver.clone());

            let report = conn.test_connection().await;

            assert!(!report.success);
            assert!(report.error.as_deref().unwrap_or_default().contains("ORA-03113"));
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert!(conn.last_error().is_some_and(Error::is_connection_fatal));
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connection_within_reports_timeout() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::hanging());
            let mut conn = connection(config(0, None), &driver);

            let report = conn.test_connection_within(Duration::from_millis(30)).await;

            assert!(!report.success);
            assert_eq!(report.attempts_used, 1);
            assert!(report.error.unwrap().contains("timed out"));
            assert_eq!(conn.state(), ConnectionState::Failed);
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connection_within_closes_session_it_opened() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);

            let report = conn.test_connection_within(Duration::from_secs(5)).await;

            assert!(report.success, "{:?}", report.error);
            assert_eq!(conn.state(), ConnectionState::Closed);
            assert_eq!(driver.live_sessions(), 0);
        });
    }

    #[test]
    fn test_connection_keeps_existing_session_open() {
        smol::block_on(async {
            let driver = Arc::new(ScriptedDriver::succeeding());
            let mut conn = connection(config(3, None), &driver);
            conn.connect().await.unwrap();

            let report = conn.test_connection().await;

            assert!(report.success);
            assert!(conn.is_open());
            assert_eq!(driver.attempts(), 1);
        });
    }
}
