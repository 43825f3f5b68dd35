//! This module defines the `AlertCondition` structure, a reusable rule that
//! binds a real-time source to a comparison target via a test.

use std::{cell::Cell, fmt, rc::Rc, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{level::AlertLevel, value::AlertValue},
    target::AlertTarget,
};

/// Unique identifier of an alert condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionId(Uuid);

impl ConditionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The comparison operator of a threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOperator {
    /// `<`
    #[serde(rename = "<")]
    LessThan,
    /// `<=`
    #[serde(rename = "<=")]
    LessOrEqual,
    /// `>`
    #[serde(rename = ">")]
    GreaterThan,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// `==`
    #[serde(rename = "==")]
    Equal,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
}

impl ThresholdOperator {
    /// Applies the operator to `lhs` and `rhs`.
    ///
    /// Ordering operators on values that do not order (mismatched variants)
    /// evaluate to false.
    pub fn compare(&self, lhs: &AlertValue, rhs: &AlertValue) -> bool {
        match self {
            ThresholdOperator::Equal => lhs == rhs,
            ThresholdOperator::NotEqual => lhs != rhs,
            ThresholdOperator::LessThan => {
                matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Less))
            }
            ThresholdOperator::LessOrEqual => matches!(
                lhs.partial_cmp(rhs),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            ),
            ThresholdOperator::GreaterThan => {
                matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Greater))
            }
            ThresholdOperator::GreaterOrEqual => matches!(
                lhs.partial_cmp(rhs),
                Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
            ),
        }
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ThresholdOperator::LessThan => "<",
            ThresholdOperator::LessOrEqual => "<=",
            ThresholdOperator::GreaterThan => ">",
            ThresholdOperator::GreaterOrEqual => ">=",
            ThresholdOperator::Equal => "==",
            ThresholdOperator::NotEqual => "!=",
        };
        write!(f, "{symbol}")
    }
}

/// Error returned when parsing an unknown operator symbol.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown threshold operator '{0}'")]
pub struct ParseOperatorError(String);

impl FromStr for ThresholdOperator {
    type Err = ParseOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(ThresholdOperator::LessThan),
            "<=" => Ok(ThresholdOperator::LessOrEqual),
            ">" => Ok(ThresholdOperator::GreaterThan),
            ">=" => Ok(ThresholdOperator::GreaterOrEqual),
            "==" => Ok(ThresholdOperator::Equal),
            "!=" => Ok(ThresholdOperator::NotEqual),
            other => Err(ParseOperatorError(other.to_string())),
        }
    }
}

/// The test an alert condition runs against its source on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionTest {
    /// Compare the source value against the target value with an operator.
    Threshold {
        /// The comparison operator.
        operator: ThresholdOperator,
    },
    /// Satisfied when the source geometry lies within any target geometry.
    Containment,
    /// Satisfied when the minimum distance between the source geometry and
    /// any target geometry is below `distance`.
    WithinDistance {
        /// The distance threshold, in the spatial layer's linear unit.
        distance: f64,
    },
    /// Exact match between the source value and the target value.
    Equality,
}

/// A reusable rule definition combining a source, a target, and a test.
///
/// A condition is immutable once constructed, except for being enabled or
/// disabled through the conditions controller. It does not itself own any
/// source; sources are attached per instance by the controller and each
/// attached instance is evaluated independently.
pub struct AlertCondition {
    id: ConditionId,
    name: String,
    level: AlertLevel,
    test: ConditionTest,
    target: Rc<AlertTarget>,
    enabled: Cell<bool>,
}

impl AlertCondition {
    /// Creates an enabled condition with a freshly generated identifier.
    pub fn new(
        name: impl Into<String>,
        level: AlertLevel,
        test: ConditionTest,
        target: Rc<AlertTarget>,
    ) -> Self {
        Self {
            id: ConditionId::generate(),
            name: name.into(),
            level,
            test,
            target,
            enabled: Cell::new(true),
        }
    }

    /// Unique identifier of the condition.
    pub fn id(&self) -> &ConditionId {
        &self.id
    }

    /// Display name of the condition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Severity carried onto every alert this condition raises.
    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// The test this condition runs.
    pub fn test(&self) -> &ConditionTest {
        &self.test
    }

    /// The comparison target.
    pub fn target(&self) -> &Rc<AlertTarget> {
        &self.target
    }

    /// Whether the condition currently takes part in evaluation.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

impl fmt::Debug for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertCondition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("level", &self.level)
            .field("test", &self.test)
            .field("enabled", &self.enabled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_construction() {
        let target = Rc::new(AlertTarget::fixed_value(10.0));
        let condition = AlertCondition::new(
            "Speed limit",
            AlertLevel::High,
            ConditionTest::Threshold { operator: ThresholdOperator::GreaterThan },
            target,
        );

        assert_eq!(condition.name(), "Speed limit");
        assert_eq!(condition.level(), AlertLevel::High);
        assert!(condition.is_enabled());
    }

    #[test]
    fn test_operator_compare_same_variant() {
        let op = ThresholdOperator::GreaterThan;
        assert!(op.compare(&AlertValue::from(15.0), &AlertValue::from(10.0)));
        assert!(!op.compare(&AlertValue::from(5.0), &AlertValue::from(10.0)));
    }

    #[test]
    fn test_ordering_operator_on_mismatched_variants_is_unsatisfied() {
        let op = ThresholdOperator::LessThan;
        assert!(!op.compare(&AlertValue::from("10"), &AlertValue::from(10.0)));
        // Equality operators still answer across variants.
        assert!(ThresholdOperator::NotEqual
            .compare(&AlertValue::from("10"), &AlertValue::from(10.0)));
    }

    #[test]
    fn test_operator_parse_and_display_round_trip() {
        for symbol in ["<", "<=", ">", ">=", "==", "!="] {
            let op: ThresholdOperator = symbol.parse().unwrap();
            assert_eq!(op.to_string(), symbol);
        }
        assert!("~=".parse::<ThresholdOperator>().is_err());
    }

    #[test]
    fn test_condition_test_serde_tagging() {
        let test = ConditionTest::WithinDistance { distance: 500.0 };
        let json = serde_json::to_string(&test).unwrap();
        assert_eq!(json, r#"{"kind":"within_distance","distance":500.0}"#);

        let parsed: ConditionTest =
            serde_json::from_str(r#"{"kind":"threshold","operator":">="}"#).unwrap();
        assert_eq!(
            parsed,
            ConditionTest::Threshold { operator: ThresholdOperator::GreaterOrEqual }
        );
    }
}
