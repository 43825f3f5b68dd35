//! This module defines `AlertSource`, the engine's handle onto one
//! real-time feed.
//!
//! A source is constructed already live. Its latest value and geometry can be
//! pulled at any time without blocking, and every update pushed into it is
//! announced synchronously to subscribers. A source ends its life with a
//! single, terminal invalidation event; after that event fires, holders must
//! already have dropped their references and no accessor may be called.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::AlertError,
    events::{Subscribers, Subscription},
    geometry::Geometry,
    models::value::AlertValue,
};

/// Identifier of one real-time feed, unique within the hosting application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Wraps a feed identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a source. The only transition is `Live` to
/// `Invalidated`, and it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The feed is producing data and may be read.
    Live,
    /// The feed is permanently gone. Reading is a contract violation.
    Invalidated,
}

struct SourceShared {
    id: SourceId,
    state: Cell<SourceState>,
    value: RefCell<Option<AlertValue>>,
    geometry: RefCell<Option<Geometry>>,
    changed: Subscribers<SourceId>,
    invalidated: Subscribers<SourceId>,
}

/// A shared handle onto one real-time feed.
///
/// Cloning is cheap and every clone views the same underlying feed state;
/// sources are shared by reference across conditions and alerts, never
/// owned exclusively by any of them. The engine never destroys a source, it
/// only reacts to [`AlertSource::invalidate`].
#[derive(Clone)]
pub struct AlertSource {
    shared: Rc<SourceShared>,
}

impl AlertSource {
    /// Creates a live source with no data received yet.
    pub fn new(id: SourceId) -> Self {
        Self {
            shared: Rc::new(SourceShared {
                id,
                state: Cell::new(SourceState::Live),
                value: RefCell::new(None),
                geometry: RefCell::new(None),
                changed: Subscribers::new(),
                invalidated: Subscribers::new(),
            }),
        }
    }

    /// Identifier of the underlying feed.
    pub fn id(&self) -> &SourceId {
        &self.shared.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SourceState {
        self.shared.state.get()
    }

    /// Returns true while the source may be read and subscribed to.
    pub fn is_live(&self) -> bool {
        self.state() == SourceState::Live
    }

    /// The latest value reported by the feed, or `None` before any data has
    /// arrived.
    pub fn current_value(&self) -> Result<Option<AlertValue>, AlertError> {
        self.guard_live()?;
        Ok(self.shared.value.borrow().clone())
    }

    /// The latest geometry reported by the feed, or `None` before any data
    /// has arrived.
    pub fn current_geometry(&self) -> Result<Option<Geometry>, AlertError> {
        self.guard_live()?;
        Ok(self.shared.geometry.borrow().clone())
    }

    /// Feed side: records a new value and announces the change.
    pub fn push_value(&self, value: AlertValue) {
        if !self.is_live() {
            tracing::error!(source = %self.shared.id, "value pushed into an invalidated source; dropped");
            return;
        }
        *self.shared.value.borrow_mut() = Some(value);
        self.shared.changed.emit(&self.shared.id);
    }

    /// Feed side: records a new geometry and announces the change.
    pub fn push_geometry(&self, geometry: Geometry) {
        if !self.is_live() {
            tracing::error!(source = %self.shared.id, "geometry pushed into an invalidated source; dropped");
            return;
        }
        *self.shared.geometry.borrow_mut() = Some(geometry);
        self.shared.changed.emit(&self.shared.id);
    }

    /// Permanently invalidates the source.
    ///
    /// The invalidation event fires exactly once; every dependent detaches
    /// synchronously during the emission, and afterwards no subscriber
    /// remains attached. Calling this on an already invalidated source is a
    /// no-op.
    pub fn invalidate(&self) {
        if !self.is_live() {
            return;
        }
        self.shared.state.set(SourceState::Invalidated);
        tracing::debug!(source = %self.shared.id, "source invalidated");
        self.shared.invalidated.emit(&self.shared.id);
        self.shared.changed.clear();
        self.shared.invalidated.clear();
    }

    /// Subscribes to change announcements. The payload is the source id.
    pub fn on_changed(&self, callback: impl Fn(&SourceId) + 'static) -> Subscription {
        if !self.is_live() {
            tracing::warn!(source = %self.shared.id, "subscription requested on an invalidated source");
            return Subscription::detached();
        }
        self.shared.changed.subscribe(callback)
    }

    /// Subscribes to the terminal invalidation event. Holders of a source
    /// reference must take this subscription at acquisition time and drop
    /// the reference when it fires.
    pub fn on_invalidated(&self, callback: impl Fn(&SourceId) + 'static) -> Subscription {
        if !self.is_live() {
            tracing::warn!(source = %self.shared.id, "subscription requested on an invalidated source");
            return Subscription::detached();
        }
        self.shared.invalidated.subscribe(callback)
    }

    fn guard_live(&self) -> Result<(), AlertError> {
        if self.is_live() {
            Ok(())
        } else {
            tracing::error!(source = %self.shared.id, "source read after invalidation");
            Err(AlertError::InvalidSourceAccess { id: self.shared.id.clone() })
        }
    }
}

impl fmt::Debug for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertSource")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.get())
            .finish()
    }
}
