//! Connection-layer traits and types.
//!
//! - **Types** (`types`): transport mode, retry policy, connection configuration
//! - **Row/Value** (`row`): driver-agnostic values, rows and statement parameters
//! - **Connection** (`connection`): the `SessionDriver` / `PhysicalSession` seam
//!   and structured driver failures
//!
//! # Example
//!
//! ```ignore
//! use oraload::services::database::traits::{ConnectionConfig, TransportMode};
//!
//! let config = ConnectionConfig::builder("db.example.com", "WMSPDB", "loader", "secret")
//!     .transport_mode(TransportMode::Secure)
//!     .fallback_port(Some(1521))
//!     .build()?;
//! ```

pub mod connection;
pub mod row;
pub mod types;

pub use connection::{
    BoxedSession, DriverError, FailureKind, PhysicalSession, SessionDriver, classify_message,
};

pub use row::{Cell, Params, Row, Value};

pub use types::{
    Backoff, ConnectTarget, ConnectionConfig, ConnectionConfigBuilder, DEFAULT_PLAIN_PORT,
    DEFAULT_SECURE_PORT, Password, RetryPolicy, TransportMode,
};
