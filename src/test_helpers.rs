//! A set of helpers for testing

use std::rc::Rc;

use crate::{
    geometry::{Geometry, SpatialQuery},
    models::{
        condition::{AlertCondition, ConditionTest, ThresholdOperator},
        level::AlertLevel,
        value::AlertValue,
    },
    source::{AlertSource, SourceId},
    target::AlertTarget,
};

/// A builder for creating `AlertCondition` instances for testing.
pub struct ConditionBuilder {
    name: String,
    level: AlertLevel,
    test: ConditionTest,
    target: Option<Rc<AlertTarget>>,
}

impl ConditionBuilder {
    /// Creates a new `ConditionBuilder` with a greater-than threshold test
    /// and a fixed target of zero.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: AlertLevel::Medium,
            test: ConditionTest::Threshold { operator: ThresholdOperator::GreaterThan },
            target: None,
        }
    }

    /// Sets the severity level for the condition.
    pub fn level(mut self, level: AlertLevel) -> Self {
        self.level = level;
        self
    }

    /// Uses a threshold test with the given operator.
    pub fn threshold(mut self, operator: ThresholdOperator) -> Self {
        self.test = ConditionTest::Threshold { operator };
        self
    }

    /// Uses a spatial containment test.
    pub fn containment(mut self) -> Self {
        self.test = ConditionTest::Containment;
        self
    }

    /// Uses a proximity test with the given distance threshold.
    pub fn within_distance(mut self, distance: f64) -> Self {
        self.test = ConditionTest::WithinDistance { distance };
        self
    }

    /// Uses an exact equality test.
    pub fn equality(mut self) -> Self {
        self.test = ConditionTest::Equality;
        self
    }

    /// Compares against a fixed value.
    pub fn fixed_target(mut self, value: impl Into<AlertValue>) -> Self {
        self.target = Some(Rc::new(AlertTarget::fixed_value(value)));
        self
    }

    /// Compares against the provided target.
    pub fn target(mut self, target: Rc<AlertTarget>) -> Self {
        self.target = Some(target);
        self
    }

    /// Builds the `AlertCondition` with the provided or default values.
    pub fn build(self) -> AlertCondition {
        let target =
            self.target.unwrap_or_else(|| Rc::new(AlertTarget::fixed_value(0.0)));
        AlertCondition::new(self.name, self.level, self.test, target)
    }
}

/// Creates a live source for testing.
pub fn live_source(id: &str) -> AlertSource {
    AlertSource::new(SourceId::from(id))
}

/// Creates a live source that has already reported `value`.
pub fn source_with_value(id: &str, value: impl Into<AlertValue>) -> AlertSource {
    let source = live_source(id);
    source.push_value(value.into());
    source
}

/// Creates a live source that has already reported a point geometry.
pub fn source_at(id: &str, x: f64, y: f64) -> AlertSource {
    let source = live_source(id);
    source.push_geometry(Geometry::point(x, y));
    source
}

/// A trivial planar `SpatialQuery` for tests: containment is envelope
/// containment and distance is the euclidean distance between envelope
/// centers. Production hosts supply a real spatial engine instead.
pub struct PlanarSpatial;

impl SpatialQuery for PlanarSpatial {
    fn contains(&self, geometry: &Geometry, targets: &[Geometry]) -> bool {
        targets.iter().any(|target| target.envelope().contains(geometry.envelope()))
    }

    fn distance(&self, geometry: &Geometry, targets: &[Geometry]) -> Option<f64> {
        let (x, y) = geometry.envelope().center();
        targets
            .iter()
            .map(|target| {
                let (tx, ty) = target.envelope().center();
                ((tx - x).powi(2) + (ty - y).powi(2)).sqrt()
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}
