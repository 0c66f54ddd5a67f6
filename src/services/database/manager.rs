//! Shared connection facade.
//!
//! `ConnectionManager` is a cheap, cloneable handle over one
//! [`ResilientConnection`]. Clones share the connection; calls through any
//! clone are serialized by an async mutex, so two loader tasks never
//! interleave statements or race a reconnect on the same session.

use async_lock::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::Result;
use super::resilient::{ConnectionState, ConnectionTestReport, ResilientConnection};
use super::traits::{ConnectionConfig, Params, Row, SessionDriver, TransportMode};

/// Serializable description of the managed connection. Excludes the password.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub transport_mode: TransportMode,
    pub verify_identity: bool,
    pub fallback_port: Option<u16>,
    pub retry_count: u32,
    pub state: ConnectionState,
    pub is_connected: bool,
    pub attempts: u32,
    pub fallback_applied: bool,
    pub active_transport_mode: Option<TransportMode>,
    pub active_port: Option<u16>,
    pub last_error: Option<String>,
}

/// Cloneable handle to a shared resilient connection.
#[derive(Clone)]
pub struct ConnectionManager {
    connection: Arc<Mutex<ResilientConnection>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").finish()
    }
}

impl ConnectionManager {
    pub fn new(connection: ResilientConnection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Wrap a new, closed connection for `config` using `driver`.
    pub fn with_driver(config: ConnectionConfig, driver: Arc<dyn SessionDriver>) -> Self {
        Self::new(ResilientConnection::new(config, driver))
    }

    /// Connect using the connection's retry policy.
    pub async fn connect(&self) -> Result<()> {
        self.connection.lock().await.connect().await
    }

    /// Close the session if one is open.
    pub async fn close(&self) -> Result<()> {
        self.connection.lock().await.disconnect().await
    }

    /// Execute a statement, connecting first if no session is open.
    ///
    /// The implicit connect runs one cycle of the retry policy. A session
    /// lost mid-statement is reported, never silently reconnected.
    pub async fn execute(&self, statement: &str, params: &Params) -> Result<u64> {
        let mut conn = self.connection.lock().await;
        Self::ensure_connected(&mut conn).await?;
        conn.execute(statement, params).await
    }

    /// Run a query and return the first row, if any.
    pub async fn fetch_one(&self, statement: &str, params: &Params) -> Result<Option<Row>> {
        let rows = self.fetch_all(statement, params).await?;
        Ok(rows.into_iter().next())
    }

    /// Run a query and return every row.
    pub async fn fetch_all(&self, statement: &str, params: &Params) -> Result<Vec<Row>> {
        let mut conn = self.connection.lock().await;
        Self::ensure_connected(&mut conn).await?;
        conn.query(statement, params).await
    }

    pub async fn test_connection(&self) -> ConnectionTestReport {
        self.connection.lock().await.test_connection().await
    }

    /// Test the connection with the connect bounded by `deadline`.
    pub async fn test_connection_within(&self, deadline: Duration) -> ConnectionTestReport {
        self.connection
            .lock()
            .await
            .test_connection_within(deadline)
            .await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_open()
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.lock().await.state()
    }

    pub async fn connection_info(&self) -> ConnectionInfo {
        let conn = self.connection.lock().await;
        let config = conn.config();
        let status = conn.status();

        ConnectionInfo {
            id: status.id,
            host: config.host().to_string(),
            port: config.port(),
            service_name: config.service_name().to_string(),
            username: config.username().to_string(),
            transport_mode: config.transport_mode(),
            verify_identity: config.verify_identity(),
            fallback_port: config.fallback_port(),
            retry_count: config.retry_policy().retry_count,
            state: status.state,
            is_connected: conn.is_open(),
            attempts: status.attempts,
            fallback_applied: conn.fallback_applied(),
            active_transport_mode: status.active_transport_mode,
            active_port: status.active_port,
            last_error: status.last_error,
        }
    }

    async fn ensure_connected(conn: &mut ResilientConnection) -> Result<()> {
        if !conn.is_open() {
            tracing::debug!(connection = %conn.id(), "No open session, connecting on demand");
            conn.connect().await?;
        }
        Ok(())
    }
}
