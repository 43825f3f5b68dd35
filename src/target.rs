//! This module defines `AlertTarget`, the abstraction of what a condition
//! compares its source against.
//!
//! The variant set is closed: a fixed scalar, a value delegated to a live
//! source, or geometries delegated to a live source. Test logic dispatches
//! on capability (has a value vs has geometries), not on variant identity.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    events::Subscription,
    geometry::{Envelope, Geometry},
    models::value::AlertValue,
    source::AlertSource,
};

/// The comparison target of an alert condition.
#[derive(Debug)]
pub enum AlertTarget {
    /// An immutable scalar with no spatial extent.
    FixedValue(FixedValueAlertTarget),
    /// A value that follows a live source.
    SourceValue(SourceValueAlertTarget),
    /// Geometries that follow a live source.
    SourceGeometry(SourceGeometryAlertTarget),
}

impl AlertTarget {
    /// A target holding `value` for its entire lifetime.
    pub fn fixed_value(value: impl Into<AlertValue>) -> Self {
        AlertTarget::FixedValue(FixedValueAlertTarget::new(value))
    }

    /// A target whose value follows `source`.
    pub fn source_value(source: &AlertSource) -> Self {
        AlertTarget::SourceValue(SourceValueAlertTarget::new(source))
    }

    /// A target whose geometries follow `source`.
    pub fn source_geometry(source: &AlertSource) -> Self {
        AlertTarget::SourceGeometry(SourceGeometryAlertTarget::new(source))
    }

    /// The value to compare against, when this target has one.
    pub fn target_value(&self) -> Option<AlertValue> {
        match self {
            AlertTarget::FixedValue(target) => Some(target.target_value()),
            AlertTarget::SourceValue(target) => target.target_value(),
            AlertTarget::SourceGeometry(_) => None,
        }
    }

    /// The geometries to test against, restricted to `query_area`.
    ///
    /// A target with no spatial extent returns an empty list; callers must
    /// treat that as "test on value only", not as an error.
    pub fn target_geometries(&self, query_area: &Envelope) -> Vec<Geometry> {
        match self {
            AlertTarget::FixedValue(_) | AlertTarget::SourceValue(_) => Vec::new(),
            AlertTarget::SourceGeometry(target) => target.target_geometries(query_area),
        }
    }

    /// The live source backing this target, when there is one and it has not
    /// been invalidated. Used by the conditions controller to wire teardown.
    pub fn backing_source(&self) -> Option<AlertSource> {
        match self {
            AlertTarget::FixedValue(_) => None,
            AlertTarget::SourceValue(target) => target.slot.source(),
            AlertTarget::SourceGeometry(target) => target.slot.source(),
        }
    }
}

/// An immutable scalar target set at construction.
#[derive(Debug)]
pub struct FixedValueAlertTarget {
    value: AlertValue,
}

impl FixedValueAlertTarget {
    /// Creates a target holding `value`.
    pub fn new(value: impl Into<AlertValue>) -> Self {
        Self { value: value.into() }
    }

    /// The constructor-supplied value, unchanged for the object's lifetime.
    pub fn target_value(&self) -> AlertValue {
        self.value.clone()
    }
}

/// A source reference paired with the invalidation subscription that clears
/// it. The pair lives and dies as one unit: when the source announces
/// invalidation the slot empties itself synchronously, and the reference is
/// never dereferenced again.
struct SourceSlot {
    slot: Rc<RefCell<Option<(AlertSource, Subscription)>>>,
}

impl SourceSlot {
    fn new(source: &AlertSource) -> Self {
        let slot: Rc<RefCell<Option<(AlertSource, Subscription)>>> = Rc::new(RefCell::new(None));
        let weak: Weak<RefCell<Option<(AlertSource, Subscription)>>> = Rc::downgrade(&slot);
        let subscription = source.on_invalidated(move |id| {
            if let Some(slot) = weak.upgrade() {
                slot.borrow_mut().take();
                tracing::debug!(source = %id, "target detached from invalidated source");
            }
        });
        if source.is_live() {
            *slot.borrow_mut() = Some((source.clone(), subscription));
        }
        Self { slot }
    }

    fn source(&self) -> Option<AlertSource> {
        self.slot.borrow().as_ref().map(|(source, _)| source.clone())
    }
}

impl std::fmt::Debug for SourceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSlot")
            .field("source", &self.source().map(|source| source.id().clone()))
            .finish()
    }
}

/// A target whose value delegates to a live source.
#[derive(Debug)]
pub struct SourceValueAlertTarget {
    slot: SourceSlot,
}

impl SourceValueAlertTarget {
    /// Creates a target following `source`'s value.
    pub fn new(source: &AlertSource) -> Self {
        Self { slot: SourceSlot::new(source) }
    }

    /// The source's latest value, or `None` once the source is gone or has
    /// not reported yet.
    pub fn target_value(&self) -> Option<AlertValue> {
        let source = self.slot.source()?;
        source.current_value().ok().flatten()
    }
}

/// A target whose geometries delegate to a live source.
#[derive(Debug)]
pub struct SourceGeometryAlertTarget {
    slot: SourceSlot,
}

impl SourceGeometryAlertTarget {
    /// Creates a target following `source`'s geometry.
    pub fn new(source: &AlertSource) -> Self {
        Self { slot: SourceSlot::new(source) }
    }

    /// The source's latest geometry restricted to `query_area`, or an empty
    /// list once the source is gone, has not reported yet, or lies outside
    /// the area.
    pub fn target_geometries(&self, query_area: &Envelope) -> Vec<Geometry> {
        let Some(source) = self.slot.source() else { return Vec::new() };
        source
            .current_geometry()
            .ok()
            .flatten()
            .filter(|geometry| query_area.intersects(geometry.envelope()))
            .into_iter()
            .collect()
    }
}
