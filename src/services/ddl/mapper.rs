//! JSON-schema to column definition mapping.
//!
//! Walks the `properties` of a JSON schema and resolves every field through
//! [`TypeInferenceEngine`], producing column definitions ready to splice into
//! a `CREATE TABLE` or `ALTER TABLE ... ADD` statement.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::inference::{SchemaFragment, TypeInferenceEngine, TypeResolutionRequest};
use super::rules::ColumnType;

/// One resolved destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    /// Upper-cased Oracle column name
    pub name: String,
    /// Field name as it appears in the source schema
    pub source_field: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl fmt::Display for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.column_type)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

/// Maps JSON-schema properties to column definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    engine: TypeInferenceEngine,
    /// Explicit metadata type tags keyed by lower-cased field name
    metadata_types: HashMap<String, String>,
}

impl SchemaMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an explicit metadata type tag to a field.
    pub fn with_metadata_type(mut self, field: &str, tag: impl Into<String>) -> Self {
        self.metadata_types.insert(field.to_lowercase(), tag.into());
        self
    }

    /// Resolve one property.
    ///
    /// The first entry of the property's `examples` array, if any, is used as
    /// the sample value.
    pub fn column_for(&self, field: &str, property: &JsonValue, required: bool) -> ColumnDefinition {
        let fragment = SchemaFragment::from_json(property);
        let sample = property
            .get("examples")
            .and_then(JsonValue::as_array)
            .and_then(|examples| examples.first());

        let request = TypeResolutionRequest {
            field_name: field,
            metadata_type: self.metadata_types.get(&field.to_lowercase()).map(String::as_str),
            schema: fragment.as_ref(),
            sample,
        };

        let nullable = !required || fragment.as_ref().is_some_and(SchemaFragment::is_nullable);

        ColumnDefinition {
            name: field.to_uppercase(),
            source_field: field.to_string(),
            column_type: self.engine.resolve_request(&request),
            nullable,
        }
    }

    /// Resolve every property of a schema.
    ///
    /// Accepts either a full object schema (with `properties` and optional
    /// `required`) or a bare properties object. Columns come out in
    /// `serde_json` map iteration order.
    pub fn map_properties(&self, schema: &JsonValue) -> Vec<ColumnDefinition> {
        let properties = match schema.get("properties").and_then(JsonValue::as_object) {
            Some(properties) => properties,
            None => match schema.as_object() {
                Some(object) => object,
                None => return Vec::new(),
            },
        };

        let required: HashSet<&str> = schema
            .get("required")
            .and_then(JsonValue::as_array)
            .map(|fields| fields.iter().filter_map(JsonValue::as_str).collect())
            .unwrap_or_default();

        properties
            .iter()
            .map(|(field, property)| self.column_for(field, property, required.contains(field.as_str())))
            .collect()
    }

    /// Render column definitions as a comma-separated list, one per line.
    pub fn render_columns(columns: &[ColumnDefinition]) -> String {
        columns
            .iter()
            .map(|c| format!("  {}", c))
            .collect::<Vec<_>>()
            .join(",\n")
    }
}
