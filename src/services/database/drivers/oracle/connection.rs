//! Oracle session driver.
//!
//! The `oracle` crate has a blocking API, so every call is moved onto the
//! blocking pool with `smol::unblock`.

use async_trait::async_trait;
use oracle::{Connection, Connector};
use std::sync::Arc;

use super::codes::{classify_connect_error, classify_statement_error};
use super::types::Binds;
use crate::services::database::traits::{
    BoxedSession, ConnectTarget, DriverError, Params, PhysicalSession, Row, SessionDriver,
};

/// Opens Oracle sessions from Easy Connect Plus descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDriver;

impl OracleDriver {
    pub fn new() -> Self {
        Self
    }

    /// A shareable driver handle
    pub fn shared() -> Arc<dyn SessionDriver> {
        Arc::new(Self)
    }
}

#[async_trait]
impl SessionDriver for OracleDriver {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn open(&self, target: &ConnectTarget) -> Result<BoxedSession, DriverError> {
        let connect_string = target.easy_connect_string();
        let username = target.username.clone();
        let password = target.password.expose().to_string();

        tracing::debug!("Opening Oracle session: {}", connect_string);

        // A dropped task still finishes on the pool; the connection it
        // produced is then dropped, which closes it.
        let conn = smol::unblock(move || {
            let mut conn = Connector::new(username, password, connect_string).connect()?;
            conn.set_autocommit(true);
            Ok::<_, oracle::Error>(conn)
        })
        .await
        .map_err(|e| classify_connect_error(e.to_string()))?;

        Ok(Box::new(OracleSession {
            conn: Arc::new(conn),
        }))
    }
}

/// An open Oracle session.
struct OracleSession {
    conn: Arc<Connection>,
}

impl OracleSession {
    async fn run<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> oracle::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        smol::unblock(move || f(&conn))
            .await
            .map_err(|e| classify_statement_error(e.to_string()))
    }
}

#[async_trait]
impl PhysicalSession for OracleSession {
    async fn execute(&mut self, statement: &str, params: &Params) -> Result<u64, DriverError> {
        let sql = statement.to_string();
        let binds = Binds::from_params(params);
        self.run(move |conn| binds.execute(conn, &sql)).await
    }

    async fn query(&mut self, statement: &str, params: &Params) -> Result<Vec<Row>, DriverError> {
        let sql = statement.to_string();
        let binds = Binds::from_params(params);
        self.run(move |conn| binds.query(conn, &sql)).await
    }

    async fn server_version(&mut self) -> Result<String, DriverError> {
        self.run(|conn| {
            let (version, banner) = conn.server_version()?;
            Ok(if banner.is_empty() {
                version.to_string()
            } else {
                banner
            })
        })
        .await
    }

    async fn current_user(&mut self) -> Result<String, DriverError> {
        self.run(|conn| conn.query_row_as::<String>("SELECT USER FROM DUAL", &[]))
            .await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.run(|conn| conn.close()).await
    }
}
