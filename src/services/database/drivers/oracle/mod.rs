//! Oracle driver implementation.
//!
//! Error classification is always available; the session driver itself needs
//! the `oracle` feature and an Oracle client library at runtime.
//!
//! # Example
//!
//! ```ignore
//! use oraload::services::database::drivers::oracle::OracleDriver;
//! use oraload::services::database::{ConnectionConfig, ResilientConnection};
//!
//! let config = ConnectionConfig::from_process_env()?;
//! let mut connection = ResilientConnection::new(config, OracleDriver::shared());
//! connection.connect().await?;
//! ```

mod codes;
#[cfg(feature = "oracle")]
mod connection;
#[cfg(feature = "oracle")]
mod types;

pub use codes::{classify_connect_error, classify_statement_error};
#[cfg(feature = "oracle")]
pub use connection::OracleDriver;
