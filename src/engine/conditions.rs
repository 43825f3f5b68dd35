//! The controller that drives alert conditions.
//!
//! `AlertConditionsController` owns the condition definitions and their
//! source bindings. Every change announced by a bound source re-runs that
//! condition's test and pushes the result through the alert lifecycle:
//! first satisfaction creates an entry in the list model, loss of
//! satisfaction deactivates it in place, renewed satisfaction reactivates
//! the retained entry, and source invalidation or condition retraction
//! removes entries outright.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use crate::{
    engine::list_model::AlertListModel,
    events::Subscription,
    geometry::SpatialQuery,
    models::{
        condition::{AlertCondition, ConditionId, ConditionTest},
        condition_data::{AlertConditionData, AlertId},
        value::AlertValue,
    },
    registry::{Tool, ToolRegistry},
    source::{AlertSource, SourceId},
    target::AlertTarget,
};

/// One bound source instance: the reference and the subscriptions that keep
/// it wired. All three detach together when the binding is dropped.
struct SourceBinding {
    source: AlertSource,
    _changed: Subscription,
    _invalidated: Subscription,
}

struct ConditionEntry {
    condition: Rc<AlertCondition>,
    bindings: Vec<SourceBinding>,
    /// Watches the target's backing source, when the target has one.
    _target_guard: Option<Subscription>,
}

#[derive(Default)]
struct ControllerInner {
    conditions: HashMap<ConditionId, ConditionEntry>,
    /// Maps each (condition, source instance) pair to its retained alert, so
    /// re-satisfaction reactivates instead of duplicating.
    pairings: HashMap<(ConditionId, SourceId), AlertId>,
}

/// Drives conditions: subscribes to sources, evaluates tests on every
/// change, and creates, updates, and retires [`AlertConditionData`] entries
/// in the shared list model.
pub struct AlertConditionsController {
    model: Rc<AlertListModel>,
    spatial: Rc<dyn SpatialQuery>,
    inner: RefCell<ControllerInner>,
    /// Handed to source subscriptions so callbacks never keep the controller
    /// alive on their own.
    self_weak: Weak<Self>,
}

impl AlertConditionsController {
    /// Creates the controller and registers it with the tool registry.
    pub fn new(
        model: Rc<AlertListModel>,
        spatial: Rc<dyn SpatialQuery>,
        registry: &ToolRegistry,
    ) -> Rc<Self> {
        let controller = Rc::new_cyclic(|weak| Self {
            model,
            spatial,
            inner: RefCell::new(ControllerInner::default()),
            self_weak: weak.clone(),
        });
        registry.register(controller.clone());
        controller
    }

    /// Adds a condition definition and returns its identifier.
    ///
    /// When the condition's target is backed by a live source, the
    /// controller watches that source: losing it retracts the condition's
    /// alerts and disables the condition.
    pub fn add_condition(&self, condition: AlertCondition) -> ConditionId {
        let condition = Rc::new(condition);
        let condition_id = condition.id().clone();

        let target_guard = condition.target().backing_source().map(|target_source| {
            let weak = self.self_weak.clone();
            let guarded = condition_id.clone();
            target_source.on_invalidated(move |_| {
                if let Some(controller) = weak.upgrade() {
                    controller.handle_target_invalidated(&guarded);
                }
            })
        });

        tracing::info!(condition = %condition_id, name = condition.name(), "condition added");
        self.inner.borrow_mut().conditions.insert(
            condition_id.clone(),
            ConditionEntry { condition, bindings: Vec::new(), _target_guard: target_guard },
        );
        condition_id
    }

    /// Removes a condition, retracting all of its alerts and detaching every
    /// source binding. Returns false for an unknown identifier.
    pub fn remove_condition(&self, condition_id: &ConditionId) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.conditions.remove(condition_id).is_none() {
                tracing::warn!(condition = %condition_id, "remove of unknown condition");
                return false;
            }
            inner.pairings.retain(|(owner, _), _| owner != condition_id);
        }
        let removed = self.model.remove_where(|alert| alert.condition_id() == condition_id);
        tracing::info!(condition = %condition_id, retracted = removed, "condition removed");
        true
    }

    /// Enables or disables a condition. Disabling retracts all of its
    /// alerts; enabling re-evaluates every attached source immediately.
    /// Returns true when the enabled state changed.
    pub fn set_condition_enabled(&self, condition_id: &ConditionId, enabled: bool) -> bool {
        let sources = {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.conditions.get(condition_id) else {
                tracing::warn!(condition = %condition_id, "enable change on unknown condition");
                return false;
            };
            if entry.condition.is_enabled() == enabled {
                return false;
            }
            entry.condition.set_enabled(enabled);
            if enabled {
                entry.bindings.iter().map(|binding| binding.source.clone()).collect()
            } else {
                inner.pairings.retain(|(owner, _), _| owner != condition_id);
                Vec::new()
            }
        };

        if enabled {
            tracing::debug!(condition = %condition_id, "condition enabled, re-evaluating");
            for source in sources {
                self.reevaluate(condition_id, &source);
            }
        } else {
            let removed = self.model.remove_where(|alert| alert.condition_id() == condition_id);
            tracing::debug!(condition = %condition_id, retracted = removed, "condition disabled");
        }
        true
    }

    /// Binds a live source instance to a condition and evaluates it
    /// immediately. Returns false when the condition is unknown, the source
    /// is not live, or the binding already exists.
    pub fn attach_source(&self, condition_id: &ConditionId, source: &AlertSource) -> bool {
        if !source.is_live() {
            tracing::warn!(source = %source.id(), "attach of an invalidated source");
            return false;
        }

        {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.conditions.get_mut(condition_id) else {
                tracing::warn!(condition = %condition_id, "attach to unknown condition");
                return false;
            };
            if entry.bindings.iter().any(|binding| binding.source.id() == source.id()) {
                tracing::debug!(
                    condition = %condition_id,
                    source = %source.id(),
                    "source already attached"
                );
                return false;
            }

            let weak = self.self_weak.clone();
            let bound_condition = condition_id.clone();
            let changed = source.on_changed(move |source_id| {
                if let Some(controller) = weak.upgrade() {
                    controller.handle_source_changed(&bound_condition, source_id);
                }
            });

            let weak = self.self_weak.clone();
            let invalidated = source.on_invalidated(move |source_id| {
                if let Some(controller) = weak.upgrade() {
                    controller.handle_source_invalidated(source_id);
                }
            });

            entry.bindings.push(SourceBinding {
                source: source.clone(),
                _changed: changed,
                _invalidated: invalidated,
            });
        }

        tracing::debug!(condition = %condition_id, source = %source.id(), "source attached");
        self.reevaluate(condition_id, source);
        true
    }

    /// The condition with identifier `id`, if known.
    pub fn condition(&self, id: &ConditionId) -> Option<Rc<AlertCondition>> {
        self.inner.borrow().conditions.get(id).map(|entry| entry.condition.clone())
    }

    /// Identifiers of every known condition.
    pub fn condition_ids(&self) -> Vec<ConditionId> {
        self.inner.borrow().conditions.keys().cloned().collect()
    }

    /// The source instances currently bound to a condition.
    pub fn attached_sources(&self, condition_id: &ConditionId) -> Vec<AlertSource> {
        self.inner
            .borrow()
            .conditions
            .get(condition_id)
            .map(|entry| entry.bindings.iter().map(|binding| binding.source.clone()).collect())
            .unwrap_or_default()
    }

    fn handle_source_changed(&self, condition_id: &ConditionId, source_id: &SourceId) {
        let source = {
            let inner = self.inner.borrow();
            inner.conditions.get(condition_id).and_then(|entry| {
                entry
                    .bindings
                    .iter()
                    .find(|binding| binding.source.id() == source_id)
                    .map(|binding| binding.source.clone())
            })
        };
        if let Some(source) = source {
            self.reevaluate(condition_id, &source);
        }
    }

    /// Invalidation is the sole teardown signal: drop every binding for the
    /// source, forget its pairings, and remove its alerts from the model in
    /// one step.
    fn handle_source_invalidated(&self, source_id: &SourceId) {
        {
            let mut inner = self.inner.borrow_mut();
            for entry in inner.conditions.values_mut() {
                entry.bindings.retain(|binding| binding.source.id() != source_id);
            }
            inner.pairings.retain(|(_, bound), _| bound != source_id);
        }
        let removed = self.model.remove_where(|alert| alert.source_id() == source_id);
        if removed > 0 {
            tracing::info!(source = %source_id, removed, "alerts removed for invalidated source");
        }
    }

    /// A condition whose target lost its backing source can no longer be
    /// evaluated: retract its alerts and disable it.
    fn handle_target_invalidated(&self, condition_id: &ConditionId) {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.conditions.get(condition_id) else { return };
            entry.condition.set_enabled(false);
            inner.pairings.retain(|(owner, _), _| owner != condition_id);
        }
        let removed = self.model.remove_where(|alert| alert.condition_id() == condition_id);
        tracing::warn!(
            condition = %condition_id,
            retracted = removed,
            "condition disabled: its target's source was invalidated"
        );
    }

    fn reevaluate(&self, condition_id: &ConditionId, source: &AlertSource) {
        enum Outcome {
            Create(Rc<AlertConditionData>),
            SetActive(AlertId, bool),
            Nothing,
        }

        let outcome = {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.conditions.get(condition_id) else { return };
            if !entry.condition.is_enabled() {
                return;
            }

            let satisfied = evaluate_test(
                entry.condition.test(),
                source,
                entry.condition.target(),
                self.spatial.as_ref(),
            );

            let key = (condition_id.clone(), source.id().clone());
            match (satisfied, inner.pairings.get(&key).cloned()) {
                (true, Some(alert_id)) => Outcome::SetActive(alert_id, true),
                (true, None) => {
                    let alert = Rc::new(AlertConditionData::new(&entry.condition, source));
                    inner.pairings.insert(key, alert.id().clone());
                    Outcome::Create(alert)
                }
                (false, Some(alert_id)) => Outcome::SetActive(alert_id, false),
                (false, None) => Outcome::Nothing,
            }
        };

        match outcome {
            Outcome::Create(alert) => {
                tracing::info!(
                    condition = %condition_id,
                    source = %source.id(),
                    alert = %alert.id(),
                    "alert raised"
                );
                let alert_id = alert.id().clone();
                if self.model.append(alert).is_err() {
                    // Unreachable with generated identifiers; keep the
                    // pairing map consistent with the model regardless.
                    self.inner
                        .borrow_mut()
                        .pairings
                        .retain(|_, paired| paired != &alert_id);
                }
            }
            Outcome::SetActive(alert_id, active) => {
                if self.model.set_active(&alert_id, active) {
                    tracing::debug!(alert = %alert_id, active, "alert state changed");
                }
            }
            Outcome::Nothing => {}
        }
    }
}

impl Tool for AlertConditionsController {
    fn name(&self) -> &str {
        "alert conditions"
    }
}

/// Runs one condition test against the current source and target state.
///
/// A source that has not yet reported the data the test needs evaluates to
/// unsatisfied, never to an error.
fn evaluate_test(
    test: &ConditionTest,
    source: &AlertSource,
    target: &AlertTarget,
    spatial: &dyn SpatialQuery,
) -> bool {
    match test {
        ConditionTest::Threshold { operator } => {
            match (read_value(source), target.target_value()) {
                (Some(value), Some(target_value)) => operator.compare(&value, &target_value),
                _ => false,
            }
        }
        ConditionTest::Equality => match (read_value(source), target.target_value()) {
            (Some(value), Some(target_value)) => value == target_value,
            _ => false,
        },
        ConditionTest::Containment => {
            let Some(geometry) = read_geometry(source) else { return false };
            let targets = target.target_geometries(geometry.envelope());
            !targets.is_empty() && spatial.contains(&geometry, &targets)
        }
        ConditionTest::WithinDistance { distance } => {
            let Some(geometry) = read_geometry(source) else { return false };
            let query_area = geometry.envelope().expanded(*distance);
            let targets = target.target_geometries(&query_area);
            match spatial.distance(&geometry, &targets) {
                Some(minimum) => minimum < *distance,
                None => false,
            }
        }
    }
}

fn read_value(source: &AlertSource) -> Option<AlertValue> {
    match source.current_value() {
        Ok(value) => value,
        Err(error) => {
            tracing::error!(error = %error, "condition evaluated against a defunct source");
            None
        }
    }
}

fn read_geometry(source: &AlertSource) -> Option<crate::geometry::Geometry> {
    match source.current_geometry() {
        Ok(geometry) => geometry,
        Err(error) => {
            tracing::error!(error = %error, "condition evaluated against a defunct source");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Geometry, MockSpatialQuery},
        models::{
            condition::ThresholdOperator,
            level::AlertLevel,
        },
        test_helpers::PlanarSpatial,
    };

    fn setup(
        spatial: Rc<dyn SpatialQuery>,
    ) -> (Rc<AlertListModel>, Rc<AlertConditionsController>) {
        let registry = ToolRegistry::new();
        let model = AlertListModel::new();
        let controller = AlertConditionsController::new(model.clone(), spatial, &registry);
        (model, controller)
    }

    fn threshold_condition(operator: ThresholdOperator, limit: f64) -> AlertCondition {
        AlertCondition::new(
            "Threshold",
            AlertLevel::High,
            ConditionTest::Threshold { operator },
            Rc::new(AlertTarget::fixed_value(limit)),
        )
    }

    #[test]
    fn test_no_data_is_unsatisfied() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let source = AlertSource::new(SourceId::from("track-1"));

        controller.attach_source(&condition_id, &source);

        assert!(model.is_empty());
    }

    #[test]
    fn test_threshold_lifecycle_create_deactivate_reactivate() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &source);

        source.push_value(AlertValue::from(5.0));
        assert!(model.is_empty());

        source.push_value(AlertValue::from(15.0));
        assert_eq!(model.count(), 1);
        let alert = model.at(0).unwrap();
        assert!(alert.active());

        source.push_value(AlertValue::from(8.0));
        assert_eq!(model.count(), 1);
        assert!(!alert.active());

        model.mark_viewed(alert.id());
        source.push_value(AlertValue::from(20.0));
        assert_eq!(model.count(), 1);
        let reactivated = model.at(0).unwrap();
        assert_eq!(reactivated.id(), alert.id());
        assert!(reactivated.active());
        assert!(reactivated.viewed());
    }

    #[test]
    fn test_independent_source_instances() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));

        let first = AlertSource::new(SourceId::from("track-1"));
        let second = AlertSource::new(SourceId::from("track-2"));
        controller.attach_source(&condition_id, &first);
        controller.attach_source(&condition_id, &second);

        first.push_value(AlertValue::from(15.0));
        second.push_value(AlertValue::from(30.0));
        assert_eq!(model.count(), 2);

        second.push_value(AlertValue::from(1.0));
        let active: usize = model.entries().iter().filter(|alert| alert.active()).count();
        assert_eq!(active, 1);
    }

    #[test]
    fn test_repeat_satisfaction_never_duplicates() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &source);

        source.push_value(AlertValue::from(15.0));
        source.push_value(AlertValue::from(16.0));
        source.push_value(AlertValue::from(17.0));

        assert_eq!(model.count(), 1);
        assert!(model.at(0).unwrap().active());
    }

    #[test]
    fn test_source_invalidation_removes_alerts_and_bindings() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let above = controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let below = controller.add_condition(threshold_condition(ThresholdOperator::LessThan, 100.0));
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&above, &source);
        controller.attach_source(&below, &source);

        source.push_value(AlertValue::from(50.0));
        assert_eq!(model.count(), 2);

        source.invalidate();
        assert!(model.is_empty());
    }

    #[test]
    fn test_disable_retracts_enable_reevaluates() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &source);
        source.push_value(AlertValue::from(15.0));
        assert_eq!(model.count(), 1);

        assert!(controller.set_condition_enabled(&condition_id, false));
        assert!(model.is_empty());

        // Changes while disabled are ignored.
        source.push_value(AlertValue::from(99.0));
        assert!(model.is_empty());

        assert!(controller.set_condition_enabled(&condition_id, true));
        assert_eq!(model.count(), 1);
        assert!(model.at(0).unwrap().active());
    }

    #[test]
    fn test_remove_condition_retracts_alerts() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &source);
        source.push_value(AlertValue::from(15.0));

        assert!(controller.remove_condition(&condition_id));
        assert!(model.is_empty());

        // The dropped binding no longer listens to the source.
        source.push_value(AlertValue::from(30.0));
        assert!(model.is_empty());
    }

    #[test]
    fn test_equality_test() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));
        let condition = AlertCondition::new(
            "Callsign watch",
            AlertLevel::Medium,
            ConditionTest::Equality,
            Rc::new(AlertTarget::fixed_value("hostile")),
        );
        let condition_id = controller.add_condition(condition);
        let source = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &source);

        source.push_value(AlertValue::from("friendly"));
        assert!(model.is_empty());

        source.push_value(AlertValue::from("hostile"));
        assert_eq!(model.count(), 1);
    }

    #[test]
    fn test_containment_uses_spatial_capability() {
        let mut spatial = MockSpatialQuery::new();
        spatial.expect_contains().returning(|_, _| true);
        let (model, controller) = setup(Rc::new(spatial));

        let zone = AlertSource::new(SourceId::from("zone"));
        zone.push_geometry(Geometry::from_envelope(crate::geometry::Envelope::new(
            0.0, 0.0, 10.0, 10.0,
        )));
        let condition = AlertCondition::new(
            "Geofence",
            AlertLevel::Critical,
            ConditionTest::Containment,
            Rc::new(AlertTarget::source_geometry(&zone)),
        );
        let condition_id = controller.add_condition(condition);

        let track = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &track);
        assert!(model.is_empty());

        track.push_geometry(Geometry::point(5.0, 5.0));
        assert_eq!(model.count(), 1);
    }

    #[test]
    fn test_containment_with_no_target_geometry_is_unsatisfied() {
        // The spatial capability must not even be consulted.
        let spatial = MockSpatialQuery::new();
        let (model, controller) = setup(Rc::new(spatial));

        let condition = AlertCondition::new(
            "Geofence",
            AlertLevel::Critical,
            ConditionTest::Containment,
            Rc::new(AlertTarget::fixed_value(1.0)),
        );
        let condition_id = controller.add_condition(condition);
        let track = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &track);

        track.push_geometry(Geometry::point(5.0, 5.0));
        assert!(model.is_empty());
    }

    #[test]
    fn test_within_distance_compares_minimum() {
        let mut spatial = MockSpatialQuery::new();
        spatial.expect_distance().returning(|_, _| Some(100.0));
        let (model, controller) = setup(Rc::new(spatial));

        let zone = AlertSource::new(SourceId::from("zone"));
        zone.push_geometry(Geometry::point(0.0, 0.0));
        let condition = AlertCondition::new(
            "Proximity",
            AlertLevel::High,
            ConditionTest::WithinDistance { distance: 500.0 },
            Rc::new(AlertTarget::source_geometry(&zone)),
        );
        let condition_id = controller.add_condition(condition);

        let track = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &track);
        track.push_geometry(Geometry::point(0.0, 50.0));

        assert_eq!(model.count(), 1);
    }

    #[test]
    fn test_target_source_invalidation_disables_condition() {
        let (model, controller) = setup(Rc::new(PlanarSpatial));

        let reference = AlertSource::new(SourceId::from("reference"));
        reference.push_value(AlertValue::from(10.0));
        let condition = AlertCondition::new(
            "Relative threshold",
            AlertLevel::Medium,
            ConditionTest::Threshold { operator: ThresholdOperator::GreaterThan },
            Rc::new(AlertTarget::source_value(&reference)),
        );
        let condition_id = controller.add_condition(condition);

        let track = AlertSource::new(SourceId::from("track-1"));
        controller.attach_source(&condition_id, &track);
        track.push_value(AlertValue::from(15.0));
        assert_eq!(model.count(), 1);

        reference.invalidate();
        assert!(model.is_empty());
        assert!(!controller.condition(&condition_id).unwrap().is_enabled());
    }

    #[test]
    fn test_attach_rejects_invalidated_source_and_duplicates() {
        let (_model, controller) = setup(Rc::new(PlanarSpatial));
        let condition_id =
            controller.add_condition(threshold_condition(ThresholdOperator::GreaterThan, 10.0));

        let gone = AlertSource::new(SourceId::from("gone"));
        gone.invalidate();
        assert!(!controller.attach_source(&condition_id, &gone));

        let source = AlertSource::new(SourceId::from("track-1"));
        assert!(controller.attach_source(&condition_id, &source));
        assert!(!controller.attach_source(&condition_id, &source));
    }
}
