//! Resilient Oracle connections and schema-driven column type mapping for
//! WMS data loads.
//!
//! - [`services::database`] opens sessions with bounded retry and
//!   transport/port fallback, behind a cloneable [`ConnectionManager`]
//! - [`services::ddl`] resolves Oracle column types for weakly typed source
//!   fields

pub mod services;

pub use services::database::{ConnectionConfig, ConnectionManager, ResilientConnection};
pub use services::ddl::{ColumnType, SchemaMapper, TypeInferenceEngine, resolve_column_type};
