use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from opening or migrating the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema migration failed
    #[error("database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Scalar Values
// ============================================================================

/// A single column value.
///
/// SQLite's dynamic typing collapses to these four shapes for the schema this
/// crate manages (text, integer, real, null).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to `f64`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Scalar::Real(f) => Some(*f),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Real(f)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A mapping from column name to scalar value.
///
/// Used both as a mutation payload (insert/update) and as a row decoded from
/// a query. Column iteration order is the sorted column name order, so the
/// SQL generated from a payload is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: BTreeMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// In-place setter, used by default injection and row decoding.
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Decode a SQLite row into a [`Record`] using the value-level type info.
///
/// The schema this crate manages carries no blob columns; anything outside
/// the three scalar shapes is decoded as text.
pub(crate) fn decode_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let scalar = if raw.is_null() {
            Scalar::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Scalar::Integer(row.try_get::<i64, _>(idx)?),
                "REAL" => Scalar::Real(row.try_get::<f64, _>(idx)?),
                _ => Scalar::Text(row.try_get::<String, _>(idx)?),
            }
        };
        record.put(column.name(), scalar);
    }

    Ok(record)
}
