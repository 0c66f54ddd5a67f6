//! Database driver implementations.
//!
//! - **Oracle**: session driver over ODPI-C via the `oracle` crate, enabled
//!   with the `oracle` cargo feature
//!
//! Drivers implement `SessionDriver` and `PhysicalSession`; the factory picks
//! the one compiled in.

mod factory;
pub mod oracle;

pub use factory::ConnectionFactory;
