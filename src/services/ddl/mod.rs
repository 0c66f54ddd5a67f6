//! Schema-to-DDL type mapping.
//!
//! - `rules` - static name patterns and metadata tags
//! - `inference` - the resolution cascade
//! - `mapper` - JSON-schema properties to column definitions
//!
//! # Example
//!
//! ```
//! use oraload::services::ddl::resolve_column_type;
//!
//! assert_eq!(resolve_column_type("order_id", None, None, None), "NUMBER");
//! assert_eq!(resolve_column_type("lpn_set", None, None, None), "VARCHAR2(4000 CHAR)");
//! ```

pub mod inference;
pub mod mapper;
pub mod rules;

pub use inference::{
    SchemaFragment, TypeInferenceEngine, TypeResolutionRequest, resolve_column_type,
};
pub use mapper::{ColumnDefinition, SchemaMapper};
pub use rules::{ColumnType, NamePattern, PatternRule, RuleTable};
