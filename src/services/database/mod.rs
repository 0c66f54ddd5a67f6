//! Resilient Oracle connection layer.
//!
//! - `traits` - driver seam, row/value types and connection configuration
//! - `config` - environment-shaped configuration loading
//! - `resilient` - retry and fallback state machine over one session
//! - `manager` - cloneable facade that serializes access to one connection
//! - `drivers` - concrete session drivers and the factory that picks one

pub mod config;
pub mod drivers;
pub mod error;
mod manager;
mod resilient;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use config::load_env_file;
pub use drivers::ConnectionFactory;
pub use error::{ConnectFailure, Error, ErrorCategory, Result};
pub use manager::{ConnectionInfo, ConnectionManager};
pub use resilient::{ConnectionState, ConnectionStatus, ConnectionTestReport, ResilientConnection};
pub use traits::{
    Backoff, ConnectTarget, ConnectionConfig, ConnectionConfigBuilder, DriverError, FailureKind,
    Params, Password, RetryPolicy, Row, SessionDriver, TransportMode, Value,
};
