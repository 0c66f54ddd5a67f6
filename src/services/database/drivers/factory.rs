//! Connection factory.
//!
//! Pairs a validated [`ConnectionConfig`] with the session driver compiled
//! into this build.
//!
//! # Example
//!
//! ```ignore
//! use oraload::services::database::drivers::ConnectionFactory;
//!
//! let manager = ConnectionFactory::from_env()?;
//! manager.execute("TRUNCATE TABLE stage_orders", &Params::None).await?;
//! ```

use std::sync::Arc;

use crate::services::database::error::Result;
use crate::services::database::manager::ConnectionManager;
use crate::services::database::resilient::ResilientConnection;
use crate::services::database::traits::{ConnectionConfig, SessionDriver};

/// Factory for resilient connections backed by the built-in driver.
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Whether a session driver is compiled into this build.
    pub fn is_supported() -> bool {
        cfg!(feature = "oracle")
    }

    /// The built-in session driver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the crate was built without the
    /// `oracle` feature.
    pub fn driver() -> Result<Arc<dyn SessionDriver>> {
        #[cfg(feature = "oracle")]
        {
            Ok(super::oracle::OracleDriver::shared())
        }
        #[cfg(not(feature = "oracle"))]
        {
            Err(crate::services::database::error::Error::configuration(
                "no database driver available: rebuild with `--features oracle`",
            ))
        }
    }

    /// Create a closed resilient connection.
    pub fn create(config: ConnectionConfig) -> Result<ResilientConnection> {
        Ok(ResilientConnection::new(config, Self::driver()?))
    }

    /// Create a shared connection facade.
    pub fn create_manager(config: ConnectionConfig) -> Result<ConnectionManager> {
        Ok(ConnectionManager::new(Self::create(config)?))
    }

    /// Create a shared connection facade configured from the process environment.
    pub fn from_env() -> Result<ConnectionManager> {
        let config = ConnectionConfig::from_process_env()?;
        tracing::debug!("Loaded connection settings for {}", config.display_name());
        Self::create_manager(config)
    }
}
