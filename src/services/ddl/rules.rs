//! Static pattern rule table.
//!
//! Field-name wildcard patterns and metadata type tags mapped to Oracle
//! column types. The table is built once and never mutated.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Largest `VARCHAR2` length, in characters
pub const MAX_VARCHAR2_LENGTH: u32 = 4000;

/// `VARCHAR2` length used when nothing better is known
pub const DEFAULT_VARCHAR2_LENGTH: u32 = 255;

/// Destination column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "length")]
pub enum ColumnType {
    /// `NUMBER`
    Number,
    /// `NUMBER(1,0)`
    Flag,
    /// `TIMESTAMP(6)`
    Timestamp,
    /// `VARCHAR2(n CHAR)`
    Varchar2(u32),
    /// `CLOB`
    Clob,
}

impl ColumnType {
    /// A `VARCHAR2` of `length` characters, kept within `1..=4000`.
    pub fn varchar2(length: u32) -> Self {
        Self::Varchar2(length.clamp(1, MAX_VARCHAR2_LENGTH))
    }

    /// A `VARCHAR2` sized by a declared max length, if one was declared.
    pub fn varchar2_declared(max_length: Option<u32>) -> Self {
        match max_length {
            Some(n) if n > 0 => Self::varchar2(n),
            _ => Self::Varchar2(DEFAULT_VARCHAR2_LENGTH),
        }
    }

    pub fn is_bounded_text(&self) -> bool {
        matches!(self, Self::Varchar2(_))
    }

    /// Replace a bounded text length with a declared one. Other types and
    /// absent or zero lengths are returned unchanged.
    pub fn with_declared_length(self, max_length: Option<u32>) -> Self {
        match (self, max_length) {
            (Self::Varchar2(_), Some(n)) if n > 0 => Self::varchar2(n),
            (other, _) => other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => f.write_str("NUMBER"),
            Self::Flag => f.write_str("NUMBER(1,0)"),
            Self::Timestamp => f.write_str("TIMESTAMP(6)"),
            Self::Varchar2(n) => write!(f, "VARCHAR2({} CHAR)", n),
            Self::Clob => f.write_str("CLOB"),
        }
    }
}

/// A field-name wildcard: `*_suffix`, `prefix_*` or an exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
}

impl NamePattern {
    pub fn parse(pattern: &'static str) -> Self {
        if let Some(suffix) = pattern.strip_prefix('*') {
            Self::Suffix(suffix)
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Self::Prefix(prefix)
        } else {
            Self::Exact(pattern)
        }
    }

    /// Match an already lower-cased field name.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == *exact,
            Self::Prefix(prefix) => name.len() > prefix.len() && name.starts_with(prefix),
            Self::Suffix(suffix) => name.len() > suffix.len() && name.ends_with(suffix),
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{}*", prefix),
            Self::Suffix(suffix) => write!(f, "*{}", suffix),
        }
    }
}

/// One named group of patterns sharing a destination type.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub key: &'static str,
    pub patterns: Vec<NamePattern>,
    pub column_type: ColumnType,
}

impl PatternRule {
    fn new(key: &'static str, patterns: &[&'static str], column_type: ColumnType) -> Self {
        Self {
            key,
            patterns: patterns.iter().copied().map(NamePattern::parse).collect(),
            column_type,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// The ordered rule table plus the metadata tag lookup.
#[derive(Debug)]
pub struct RuleTable {
    bulk_override: PatternRule,
    groups: Vec<PatternRule>,
    tags: HashMap<&'static str, ColumnType>,
}

/// Key of the reserved `_set` override group
pub const BULK_COLLECTION_KEY: &str = "bulk_collection";

static STANDARD: LazyLock<RuleTable> = LazyLock::new(RuleTable::build);

impl RuleTable {
    /// The process-wide table.
    pub fn standard() -> &'static RuleTable {
        &STANDARD
    }

    fn build() -> Self {
        let bulk_override = PatternRule::new(
            BULK_COLLECTION_KEY,
            &["*_set"],
            ColumnType::Varchar2(MAX_VARCHAR2_LENGTH),
        );

        let groups = vec![
            PatternRule::new("identifier", &["id", "*_id"], ColumnType::Number),
            PatternRule::new(
                "flag",
                &["*_flg", "*_flag", "is_*", "has_*"],
                ColumnType::Flag,
            ),
            PatternRule::new(
                "timestamp",
                &["*_ts", "*_date", "*_datetime", "*_timestamp", "*_at"],
                ColumnType::Timestamp,
            ),
            PatternRule::new(
                "measure",
                &[
                    "*_qty",
                    "*_quantity",
                    "*_amount",
                    "*_amt",
                    "*_count",
                    "*_weight",
                    "*_volume",
                    "*_price",
                    "*_cost",
                    "*_seq_nbr",
                ],
                ColumnType::Number,
            ),
            PatternRule::new("document", &["*_json", "*_payload", "*_xml"], ColumnType::Clob),
            PatternRule::new(
                "long_text",
                &[
                    "*_desc",
                    "*_description",
                    "*_comment",
                    "*_comments",
                    "*_notes",
                    "*_instructions",
                ],
                ColumnType::Varchar2(MAX_VARCHAR2_LENGTH),
            ),
            PatternRule::new(
                "code",
                &["*_code", "*_status", "*_type", "*_uom"],
                ColumnType::Varchar2(50),
            ),
            PatternRule::new(
                "name",
                &["*_name", "*_key", "*_nbr"],
                ColumnType::Varchar2(DEFAULT_VARCHAR2_LENGTH),
            ),
        ];

        let tag_groups: [(&[&'static str], ColumnType); 5] = [
            (
                &[
                    "integer", "int", "bigint", "number", "numeric", "decimal", "float", "double",
                    "id",
                ],
                ColumnType::Number,
            ),
            (&["boolean", "bool", "flag"], ColumnType::Flag),
            (
                &["string", "text", "varchar", "varchar2", "char"],
                ColumnType::Varchar2(DEFAULT_VARCHAR2_LENGTH),
            ),
            (
                &["date", "datetime", "date-time", "timestamp", "time"],
                ColumnType::Timestamp,
            ),
            (
                &["clob", "json", "object", "array", "long_text"],
                ColumnType::Clob,
            ),
        ];
        let tags = tag_groups
            .iter()
            .flat_map(|(names, ty)| names.iter().map(move |name| (*name, *ty)))
            .collect();

        Self {
            bulk_override,
            groups,
            tags,
        }
    }

    /// Whether `name` (lower-cased) carries the reserved bulk collection suffix.
    pub fn is_bulk_collection(&self, name: &str) -> bool {
        self.bulk_override.matches(name)
    }

    /// First group matching `name` (lower-cased); the override group first.
    pub fn match_name(&self, name: &str) -> Option<&PatternRule> {
        self.rules().find(|rule| rule.matches(name))
    }

    /// Type for a metadata tag, case-insensitive.
    pub fn metadata_type(&self, tag: &str) -> Option<ColumnType> {
        self.tags.get(tag.trim().to_lowercase().as_str()).copied()
    }

    /// All groups in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        std::iter::once(&self.bulk_override).chain(self.groups.iter())
    }
}
