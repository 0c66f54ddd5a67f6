//! Column type inference.
//!
//! Resolves one Oracle column type for a source field from whatever is
//! known about it. Evidence is tried in strict priority order and the first
//! hit wins:
//!
//! 1. explicit metadata type tag
//! 2. field name against the pattern rule table
//! 3. JSON-schema fragment (`type`, `format`, `maxLength`)
//! 4. a sample value
//! 5. `VARCHAR2(255 CHAR)`
//!
//! Resolution is pure: the same request always yields the same type, and no
//! input makes it fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::rules::{
    ColumnType, DEFAULT_VARCHAR2_LENGTH, MAX_VARCHAR2_LENGTH, RuleTable,
};

/// The part of a JSON-schema property that inference looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFragment {
    /// Declared types; nullable unions list `"null"` alongside the real type
    pub types: Vec<String>,
    pub format: Option<String>,
    pub max_length: Option<u32>,
}

impl SchemaFragment {
    pub fn new(json_type: impl Into<String>) -> Self {
        Self {
            types: vec![json_type.into()],
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Read a fragment from a JSON-schema property.
    ///
    /// Returns `None` when the value is not an object. Fields of the wrong
    /// shape are ignored rather than rejected.
    pub fn from_json(property: &JsonValue) -> Option<Self> {
        let object = property.as_object()?;

        let types = match object.get("type") {
            Some(JsonValue::String(t)) => vec![t.clone()],
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let format = object
            .get("format")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let max_length = object
            .get("maxLength")
            .and_then(JsonValue::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

        Some(Self {
            types,
            format,
            max_length,
        })
    }

    /// First declared type that is not `"null"`, lower-cased.
    pub fn primary_type(&self) -> Option<String> {
        self.types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .find(|t| t != "null")
    }

    /// Whether the fragment admits `null`
    pub fn is_nullable(&self) -> bool {
        self.types.iter().any(|t| t.trim().eq_ignore_ascii_case("null"))
    }

    fn column_type(&self) -> Option<ColumnType> {
        let primary = self.primary_type()?;
        match primary.as_str() {
            "integer" | "number" => Some(ColumnType::Number),
            "boolean" => Some(ColumnType::Flag),
            "string" => {
                let format = self.format.as_deref().map(str::to_lowercase);
                match format.as_deref() {
                    Some("date" | "date-time" | "time") => Some(ColumnType::Timestamp),
                    _ => Some(ColumnType::varchar2_declared(self.max_length)),
                }
            }
            "object" | "array" => Some(ColumnType::Clob),
            _ => None,
        }
    }
}

/// Everything known about one source field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeResolutionRequest<'a> {
    pub field_name: &'a str,
    pub metadata_type: Option<&'a str>,
    pub schema: Option<&'a SchemaFragment>,
    pub sample: Option<&'a JsonValue>,
}

impl<'a> TypeResolutionRequest<'a> {
    pub fn new(field_name: &'a str) -> Self {
        Self {
            field_name,
            ..Default::default()
        }
    }

    pub fn metadata_type(mut self, tag: &'a str) -> Self {
        self.metadata_type = Some(tag);
        self
    }

    pub fn schema(mut self, schema: &'a SchemaFragment) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn sample(mut self, sample: &'a JsonValue) -> Self {
        self.sample = Some(sample);
        self
    }
}

/// Resolves destination column types against the standard rule table.
#[derive(Debug, Clone, Copy)]
pub struct TypeInferenceEngine {
    rules: &'static RuleTable,
}

impl Default for TypeInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInferenceEngine {
    pub fn new() -> Self {
        Self {
            rules: RuleTable::standard(),
        }
    }

    pub fn rules(&self) -> &'static RuleTable {
        self.rules
    }

    /// Resolve a destination type string such as `VARCHAR2(50 CHAR)`.
    pub fn resolve(
        &self,
        field_name: &str,
        metadata_type: Option<&str>,
        schema: Option<&SchemaFragment>,
        sample: Option<&JsonValue>,
    ) -> String {
        self.resolve_type(field_name, metadata_type, schema, sample)
            .to_string()
    }

    /// Resolve a destination column type.
    pub fn resolve_type(
        &self,
        field_name: &str,
        metadata_type: Option<&str>,
        schema: Option<&SchemaFragment>,
        sample: Option<&JsonValue>,
    ) -> ColumnType {
        self.resolve_request(&TypeResolutionRequest {
            field_name,
            metadata_type,
            schema,
            sample,
        })
    }

    pub fn resolve_request(&self, request: &TypeResolutionRequest<'_>) -> ColumnType {
        let name = request.field_name.trim().to_lowercase();
        let declared_length = request.schema.and_then(|s| s.max_length);

        if let Some(ty) = request
            .metadata_type
            .and_then(|tag| self.rules.metadata_type(tag))
        {
            if ty.is_bounded_text() && self.rules.is_bulk_collection(&name) {
                return ColumnType::Varchar2(MAX_VARCHAR2_LENGTH);
            }
            return ty.with_declared_length(declared_length);
        }

        if let Some(rule) = self.rules.match_name(&name) {
            if self.rules.is_bulk_collection(&name) {
                return rule.column_type;
            }
            return rule.column_type.with_declared_length(declared_length);
        }

        if let Some(ty) = request.schema.and_then(SchemaFragment::column_type) {
            return ty;
        }

        if let Some(ty) = request.sample.and_then(sample_column_type) {
            return ty;
        }

        ColumnType::Varchar2(DEFAULT_VARCHAR2_LENGTH)
    }
}

/// Resolve a destination type string with the standard engine.
pub fn resolve_column_type(
    field_name: &str,
    metadata_type: Option<&str>,
    schema: Option<&SchemaFragment>,
    sample: Option<&JsonValue>,
) -> String {
    TypeInferenceEngine::new().resolve(field_name, metadata_type, schema, sample)
}

fn sample_column_type(sample: &JsonValue) -> Option<ColumnType> {
    match sample {
        JsonValue::Bool(_) => Some(ColumnType::Flag),
        JsonValue::Number(_) => Some(ColumnType::Number),
        JsonValue::String(s) if s.is_empty() => Some(ColumnType::Varchar2(DEFAULT_VARCHAR2_LENGTH)),
        JsonValue::String(s) if looks_like_timestamp(s) => Some(ColumnType::Timestamp),
        JsonValue::String(s) => {
            let doubled = u32::try_from(s.chars().count())
                .unwrap_or(u32::MAX)
                .saturating_mul(2);
            Some(ColumnType::varchar2(doubled))
        }
        JsonValue::Array(_) | JsonValue::Object(_) => Some(ColumnType::Clob),
        JsonValue::Null => None,
    }
}

/// `YYYY-MM-DD`, `MM/DD/YYYY` or an ISO-8601 date-time naming a real instant.
fn looks_like_timestamp(s: &str) -> bool {
    let s = s.trim();
    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            || NaiveDate::parse_from_str(s, "%m/%d/%Y").is_ok();
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}
