//! This module defines `AlertConditionData`, the live evaluation result of
//! one (condition, source instance) pairing and the unit surfaced to users.

use std::{cell::Cell, fmt, rc::Rc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AlertError,
    geometry::Geometry,
    models::{
        condition::{AlertCondition, ConditionId},
        level::AlertLevel,
    },
    source::{AlertSource, SourceId},
    target::AlertTarget,
};

/// Unique identifier of one alert entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(Uuid);

impl AlertId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One alert: the live evaluation result of a condition against one concrete
/// source instance.
///
/// Created when the condition's test first evaluates satisfied for the
/// source instance. Deactivated, not destroyed, when the test stops being
/// satisfied, so the acknowledgment state survives until the entry is
/// removed. Removed when the owning condition is disabled or removed, or
/// when the source is invalidated.
pub struct AlertConditionData {
    id: AlertId,
    condition_id: ConditionId,
    condition_name: String,
    level: AlertLevel,
    source: AlertSource,
    target: Rc<AlertTarget>,
    active: Cell<bool>,
    viewed: Cell<bool>,
    created_at: DateTime<Utc>,
}

impl AlertConditionData {
    /// Creates an active, unviewed alert for `condition` against `source`.
    pub fn new(condition: &AlertCondition, source: &AlertSource) -> Self {
        Self {
            id: AlertId::generate(),
            condition_id: condition.id().clone(),
            condition_name: condition.name().to_string(),
            level: condition.level(),
            source: source.clone(),
            target: condition.target().clone(),
            active: Cell::new(true),
            viewed: Cell::new(false),
            created_at: Utc::now(),
        }
    }

    /// Unique identifier of this alert.
    pub fn id(&self) -> &AlertId {
        &self.id
    }

    /// Identifier of the condition that raised this alert.
    pub fn condition_id(&self) -> &ConditionId {
        &self.condition_id
    }

    /// Display name of the condition that raised this alert.
    pub fn condition_name(&self) -> &str {
        &self.condition_name
    }

    /// Severity of this alert.
    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// The concrete source instance this alert was evaluated against.
    pub fn source(&self) -> &AlertSource {
        &self.source
    }

    /// Identifier of the source instance.
    pub fn source_id(&self) -> &SourceId {
        self.source.id()
    }

    /// The comparison target of the owning condition.
    pub fn target(&self) -> &Rc<AlertTarget> {
        &self.target
    }

    /// Whether the condition's test is currently satisfied for this entry.
    pub fn active(&self) -> bool {
        self.active.get()
    }

    /// Whether the user has acknowledged this alert.
    pub fn viewed(&self) -> bool {
        self.viewed.get()
    }

    /// When this alert was first raised.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The current position of the underlying source, for the rendering
    /// layer. Valid for as long as this entry remains in the list model.
    pub fn current_geometry(&self) -> Result<Option<Geometry>, AlertError> {
        self.source.current_geometry()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub(crate) fn set_viewed(&self, viewed: bool) {
        self.viewed.set(viewed);
    }
}

impl fmt::Debug for AlertConditionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertConditionData")
            .field("id", &self.id)
            .field("condition", &self.condition_name)
            .field("source", self.source.id())
            .field("level", &self.level)
            .field("active", &self.active.get())
            .field("viewed", &self.viewed.get())
            .finish()
    }
}
