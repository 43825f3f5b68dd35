//! Severity levels assigned to alert conditions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The severity of an alert condition, carried onto every alert it raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Noteworthy, no immediate action expected.
    Low,
    /// Worth attention soon.
    Medium,
    /// Requires prompt attention.
    High,
    /// Requires immediate attention.
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(AlertLevel::Low < AlertLevel::Medium);
        assert!(AlertLevel::Medium < AlertLevel::High);
        assert!(AlertLevel::High < AlertLevel::Critical);
    }

    #[test]
    fn test_serde_round_trip_is_lowercase() {
        assert_eq!(serde_json::to_string(&AlertLevel::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::from_str::<AlertLevel>("\"medium\"").unwrap(), AlertLevel::Medium);
    }
}
