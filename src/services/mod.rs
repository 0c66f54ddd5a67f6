pub mod database;
pub mod ddl;

pub use database::{ConnectionConfig, ConnectionManager, Error, ResilientConnection};
pub use ddl::{ColumnType, SchemaMapper, TypeInferenceEngine, resolve_column_type};
