//! Store-neutral column values.
//!
//! Mapped records are flattened into rows of [`SqlValue`] in the column order
//! of their [`Relation`](super::Relation). Each target adapter converts these
//! into its own wire representation.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Type hint for NULL values so adapters can cast or encode them correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I32,
    Text,
    Json,
    Uuid,
    Timestamp,
    TextSet,
}

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Boolean value.
    Bool(bool),

    /// 32-bit signed integer.
    I32(i32),

    /// Text.
    Text(String),

    /// Serialized JSON document.
    Json(String),

    /// UUID value.
    Uuid(Uuid),

    /// Timezone-aware instant.
    Timestamp(DateTime<Utc>),

    /// Set of strings.
    TextSet(BTreeSet<String>),
}

/// One destination row, in relation column order.
pub type Row = Vec<SqlValue>;

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value.
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::Text(_) => SqlNullType::Text,
            SqlValue::Json(_) => SqlNullType::Json,
            SqlValue::Uuid(_) => SqlNullType::Uuid,
            SqlValue::Timestamp(_) => SqlNullType::Timestamp,
            SqlValue::TextSet(_) => SqlNullType::TextSet,
        }
    }

    /// Canonical text rendering, `None` for NULL.
    ///
    /// Used for PostgreSQL text parameters (paired with a cast) and as the
    /// primary-key fingerprint of the in-memory target.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            SqlValue::Null(_) => None,
            SqlValue::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
            SqlValue::I32(n) => Some(n.to_string()),
            SqlValue::Text(s) | SqlValue::Json(s) => Some(s.clone()),
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            SqlValue::TextSet(set) => {
                let items: Vec<String> = set
                    .iter()
                    .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect();
                Some(format!("{{{}}}", items.join(",")))
            }
        }
    }
}

// Optional-value constructors used by the record mappers.
impl SqlValue {
    pub fn opt_text(v: Option<String>) -> Self {
        v.map(SqlValue::Text)
            .unwrap_or(SqlValue::Null(SqlNullType::Text))
    }

    pub fn opt_json(v: Option<String>) -> Self {
        v.map(SqlValue::Json)
            .unwrap_or(SqlValue::Null(SqlNullType::Json))
    }

    pub fn opt_uuid(v: Option<Uuid>) -> Self {
        v.map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid))
    }

    pub fn opt_timestamp(v: Option<DateTime<Utc>>) -> Self {
        v.map(SqlValue::Timestamp)
            .unwrap_or(SqlValue::Null(SqlNullType::Timestamp))
    }

    pub fn opt_i32(v: Option<i32>) -> Self {
        v.map(SqlValue::I32).unwrap_or(SqlValue::Null(SqlNullType::I32))
    }

    pub fn opt_set(v: Option<BTreeSet<String>>) -> Self {
        v.map(SqlValue::TextSet)
            .unwrap_or(SqlValue::Null(SqlNullType::TextSet))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}
