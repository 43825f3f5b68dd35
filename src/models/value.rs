//! The typed values real-time feeds report and conditions compare against.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single value reported by a feed or configured on a target.
///
/// Ordering is only defined between values of the same variant; a threshold
/// test across mismatched variants is unsatisfied rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertValue {
    /// A boolean attribute (`false` orders before `true`).
    Boolean(bool),
    /// A numeric attribute.
    Number(f64),
    /// A textual attribute, ordered lexicographically.
    Text(String),
}

impl PartialOrd for AlertValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (AlertValue::Boolean(lhs), AlertValue::Boolean(rhs)) => lhs.partial_cmp(rhs),
            (AlertValue::Number(lhs), AlertValue::Number(rhs)) => lhs.partial_cmp(rhs),
            (AlertValue::Text(lhs), AlertValue::Text(rhs)) => lhs.partial_cmp(rhs),
            _ => None,
        }
    }
}

impl From<bool> for AlertValue {
    fn from(value: bool) -> Self {
        AlertValue::Boolean(value)
    }
}

impl From<f64> for AlertValue {
    fn from(value: f64) -> Self {
        AlertValue::Number(value)
    }
}

impl From<i64> for AlertValue {
    fn from(value: i64) -> Self {
        AlertValue::Number(value as f64)
    }
}

impl From<&str> for AlertValue {
    fn from(value: &str) -> Self {
        AlertValue::Text(value.to_string())
    }
}

impl From<String> for AlertValue {
    fn from(value: String) -> Self {
        AlertValue::Text(value)
    }
}

impl fmt::Display for AlertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertValue::Boolean(value) => write!(f, "{value}"),
            AlertValue::Number(value) => write!(f, "{value}"),
            AlertValue::Text(value) => write!(f, "{value}"),
        }
    }
}
