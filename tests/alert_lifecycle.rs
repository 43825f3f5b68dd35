//! Integration tests for the condition evaluation and alert lifecycle.

use std::rc::Rc;

use vigil::{
    engine::{
        conditions::AlertConditionsController,
        list_model::{AlertListModel, ListChange},
        viewed::ViewedAlertsController,
    },
    error::AlertError,
    models::condition::ThresholdOperator,
    registry::ToolRegistry,
    source::{AlertSource, SourceId},
    test_helpers::{live_source, ConditionBuilder, PlanarSpatial},
};

struct Harness {
    registry: ToolRegistry,
    model: Rc<AlertListModel>,
    conditions: Rc<AlertConditionsController>,
    viewed: Rc<ViewedAlertsController>,
}

fn harness() -> Harness {
    let registry = ToolRegistry::new();
    let model = AlertListModel::new();
    let conditions =
        AlertConditionsController::new(model.clone(), Rc::new(PlanarSpatial), &registry);
    let viewed = ViewedAlertsController::new(&model, &registry);
    Harness { registry, model, conditions, viewed }
}

fn assert_count_consistent(harness: &Harness) {
    let expected = harness
        .model
        .entries()
        .iter()
        .filter(|alert| alert.active() && !alert.viewed())
        .count();
    assert_eq!(harness.viewed.unviewed_active_count(), expected);
}

#[test]
fn test_controllers_register_as_tools() {
    let harness = harness();
    assert!(harness.registry.tool("alert conditions").is_some());
    assert!(harness.registry.tool("viewed alerts").is_some());
}

#[test]
fn test_threshold_scenario_create_then_deactivate() {
    // A threshold condition `value > 10` against a fixed target of 10.
    let harness = harness();
    let condition_id = harness.conditions.add_condition(
        ConditionBuilder::new("Speed limit")
            .threshold(ThresholdOperator::GreaterThan)
            .fixed_target(10.0)
            .build(),
    );
    let source = live_source("track-1");
    harness.conditions.attach_source(&condition_id, &source);

    source.push_value(5.0.into());
    assert!(harness.model.is_empty());
    assert_count_consistent(&harness);

    source.push_value(15.0.into());
    assert_eq!(harness.model.count(), 1);
    let alert = harness.model.at(0).unwrap();
    assert!(alert.active());
    assert_count_consistent(&harness);

    source.push_value(8.0.into());
    assert_eq!(harness.model.count(), 1);
    assert!(!harness.model.at(0).unwrap().active());
    assert_count_consistent(&harness);
}

#[test]
fn test_active_entries_match_satisfying_instances() {
    let harness = harness();
    let condition_id = harness.conditions.add_condition(
        ConditionBuilder::new("Altitude floor")
            .threshold(ThresholdOperator::LessThan)
            .fixed_target(100.0)
            .build(),
    );

    let sources: Vec<AlertSource> =
        (1..=4).map(|n| live_source(&format!("track-{n}"))).collect();
    for source in &sources {
        harness.conditions.attach_source(&condition_id, source);
    }

    // Three below the floor, one above.
    sources[0].push_value(50.0.into());
    sources[1].push_value(80.0.into());
    sources[2].push_value(150.0.into());
    sources[3].push_value(99.0.into());

    let active = harness.model.entries().iter().filter(|alert| alert.active()).count();
    assert_eq!(active, 3);
    assert_count_consistent(&harness);

    // One drops out, one comes back in.
    sources[0].push_value(200.0.into());
    sources[2].push_value(10.0.into());

    let active = harness.model.entries().iter().filter(|alert| alert.active()).count();
    assert_eq!(active, 3);
    assert_count_consistent(&harness);
}

#[test]
fn test_reactivation_preserves_identifier_and_viewed_flag() {
    let harness = harness();
    let condition_id = harness.conditions.add_condition(
        ConditionBuilder::new("Speed limit")
            .threshold(ThresholdOperator::GreaterThan)
            .fixed_target(10.0)
            .build(),
    );
    let source = live_source("track-1");
    harness.conditions.attach_source(&condition_id, &source);

    source.push_value(15.0.into());
    let alert = harness.model.at(0).unwrap();
    harness.model.mark_viewed(alert.id());

    source.push_value(5.0.into());
    source.push_value(25.0.into());

    assert_eq!(harness.model.count(), 1);
    let reactivated = harness.model.at(0).unwrap();
    assert_eq!(reactivated.id(), alert.id());
    assert!(reactivated.active());
    assert!(reactivated.viewed());
    assert_count_consistent(&harness);
}

#[test]
fn test_source_invalidation_sweeps_all_entries_in_one_step() {
    // Scenario: a source destroyed while two conditions hold active entries
    // against it. Both entries leave the model in the same evaluation step
    // and the aggregate updates once.
    let harness = harness();
    let above = harness.conditions.add_condition(
        ConditionBuilder::new("Above")
            .threshold(ThresholdOperator::GreaterThan)
            .fixed_target(10.0)
            .build(),
    );
    let below = harness.conditions.add_condition(
        ConditionBuilder::new("Below")
            .threshold(ThresholdOperator::LessThan)
            .fixed_target(100.0)
            .build(),
    );

    let source = live_source("track-1");
    harness.conditions.attach_source(&above, &source);
    harness.conditions.attach_source(&below, &source);
    source.push_value(50.0.into());
    assert_eq!(harness.model.count(), 2);

    let count_events = std::rc::Rc::new(std::cell::Cell::new(0usize));
    let count_events_cb = count_events.clone();
    let _sub = harness.viewed.on_count_changed(move |_| {
        count_events_cb.set(count_events_cb.get() + 1);
    });

    source.invalidate();

    assert!(harness.model.is_empty());
    assert_eq!(harness.viewed.unviewed_active_count(), 0);
    assert_eq!(count_events.get(), 1);

    // No entry referencing the invalidated source survives anywhere.
    assert!(harness
        .model
        .entries()
        .iter()
        .all(|alert| alert.source_id() != &SourceId::from("track-1")));
}

#[test]
fn test_model_change_notifications_for_lifecycle() {
    let harness = harness();
    let condition_id = harness.conditions.add_condition(
        ConditionBuilder::new("Speed limit")
            .threshold(ThresholdOperator::GreaterThan)
            .fixed_target(10.0)
            .build(),
    );
    let source = live_source("track-1");
    harness.conditions.attach_source(&condition_id, &source);

    let changes = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let changes_cb = changes.clone();
    let _sub = harness.model.subscribe(move |change| changes_cb.borrow_mut().push(*change));

    source.push_value(15.0.into()); // insert
    source.push_value(20.0.into()); // still satisfied, no change
    source.push_value(5.0.into()); // deactivate
    source.invalidate(); // remove

    assert_eq!(
        *changes.borrow(),
        vec![
            ListChange::Inserted { first: 0, last: 0 },
            ListChange::Updated { first: 0, last: 0 },
            ListChange::Removed { first: 0, last: 0 },
        ]
    );
}

#[test]
fn test_disable_and_remove_retract_entries() {
    let harness = harness();
    let condition_id = harness.conditions.add_condition(
        ConditionBuilder::new("Speed limit")
            .threshold(ThresholdOperator::GreaterThan)
            .fixed_target(10.0)
            .build(),
    );
    let source = live_source("track-1");
    harness.conditions.attach_source(&condition_id, &source);
    source.push_value(15.0.into());
    assert_eq!(harness.model.count(), 1);

    harness.conditions.set_condition_enabled(&condition_id, false);
    assert!(harness.model.is_empty());
    assert_count_consistent(&harness);

    harness.conditions.set_condition_enabled(&condition_id, true);
    assert_eq!(harness.model.count(), 1);
    assert_count_consistent(&harness);

    harness.conditions.remove_condition(&condition_id);
    assert!(harness.model.is_empty());
    assert_count_consistent(&harness);
}

#[test]
fn test_out_of_range_access_leaves_model_unchanged() {
    let harness = harness();
    let result = harness.model.at(0);
    assert_eq!(result.unwrap_err(), AlertError::OutOfRange { index: 0, count: 0 });
    assert!(harness.model.is_empty());
}
