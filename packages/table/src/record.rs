//! In-memory form of one attribute-table row.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A single populated cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Character data.
    Text(String),
    /// Whole number (counts).
    Integer(i64),
    /// Floating point number.
    Real(f64),
}

impl FieldValue {
    /// Numeric view of the value. Text is parsed leniently.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
        }
    }
}

/// One row keyed by column name. An absent key is an unset (null) cell.
pub type FlatRecord = BTreeMap<String, FieldValue>;
