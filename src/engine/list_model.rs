//! The process-wide ordered collection of alerts.
//!
//! `AlertListModel` is the single source of truth for which alerts currently
//! exist. Every mutating operation that changes state emits exactly one
//! structured [`ListChange`] synchronously before returning, so observers
//! always see a model consistent with the notification they just received.
//! Rejected or no-op mutations emit nothing.
//!
//! One logical model exists per process: the application root constructs it
//! and passes it by reference to every controller.

use std::{cell::RefCell, rc::Rc};

use crate::{
    error::AlertError,
    events::{Subscribers, Subscription},
    models::condition_data::{AlertConditionData, AlertId},
};

/// A structured description of one model mutation. Index ranges are
/// inclusive and refer to the model state at the moment of emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// Rows `first..=last` were just inserted.
    Inserted {
        /// First affected index.
        first: usize,
        /// Last affected index.
        last: usize,
    },
    /// Rows `first..=last` (pre-removal indices) were just removed.
    Removed {
        /// First affected index.
        first: usize,
        /// Last affected index.
        last: usize,
    },
    /// Rows `first..=last` changed in place (flags flipped).
    Updated {
        /// First affected index.
        first: usize,
        /// Last affected index.
        last: usize,
    },
    /// The model changed wholesale; observers should rescan.
    Reset,
}

/// The ordered, id-unique collection of all current alerts.
///
/// Insertion order is relevance order. Every entry's source and target stay
/// valid for as long as the entry remains here: invalidation of a source
/// removes its entries before anything else observes the model.
#[derive(Default)]
pub struct AlertListModel {
    entries: RefCell<Vec<Rc<AlertConditionData>>>,
    changes: Subscribers<ListChange>,
}

impl AlertListModel {
    /// Creates an empty model.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of alerts currently in the model.
    pub fn count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true when the model holds no alerts.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// The alert at `index`.
    pub fn at(&self, index: usize) -> Result<Rc<AlertConditionData>, AlertError> {
        let entries = self.entries.borrow();
        entries
            .get(index)
            .cloned()
            .ok_or(AlertError::OutOfRange { index, count: entries.len() })
    }

    /// Appends `entry` and announces the insertion.
    ///
    /// An entry whose identifier already exists is rejected: the model is
    /// untouched, the original entry retained, no notification emitted.
    pub fn append(&self, entry: Rc<AlertConditionData>) -> Result<(), AlertError> {
        let index = {
            let mut entries = self.entries.borrow_mut();
            if entries.iter().any(|existing| existing.id() == entry.id()) {
                tracing::warn!(alert = %entry.id(), "rejected alert with duplicate identifier");
                return Err(AlertError::DuplicateIdentifier { id: entry.id().clone() });
            }
            entries.push(entry);
            entries.len() - 1
        };
        self.changes.emit(&ListChange::Inserted { first: index, last: index });
        Ok(())
    }

    /// Removes and returns the alert at `index`, announcing the removal.
    pub fn remove_at(&self, index: usize) -> Result<Rc<AlertConditionData>, AlertError> {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            if index >= entries.len() {
                return Err(AlertError::OutOfRange { index, count: entries.len() });
            }
            entries.remove(index)
        };
        self.changes.emit(&ListChange::Removed { first: index, last: index });
        Ok(removed)
    }

    /// Removes the alert with identifier `id`, if present.
    pub fn remove_by_id(&self, id: &AlertId) -> Option<Rc<AlertConditionData>> {
        let index = self.index_of(id)?;
        self.remove_at(index).ok()
    }

    /// Removes every alert matching `predicate` in one operation and returns
    /// how many were removed.
    ///
    /// A single notification covers the whole batch: a `Removed` range when
    /// the matching rows are contiguous, a `Reset` otherwise. Used for
    /// source-invalidation and condition-retraction cleanup, where all
    /// affected entries must leave the model in one evaluation step.
    pub fn remove_where(&self, predicate: impl Fn(&AlertConditionData) -> bool) -> usize {
        let (removed, change) = {
            let mut entries = self.entries.borrow_mut();
            let matching: Vec<usize> = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| predicate(entry))
                .map(|(index, _)| index)
                .collect();
            if matching.is_empty() {
                return 0;
            }

            let contiguous = matching.last().unwrap() - matching[0] + 1 == matching.len();
            let change = if contiguous {
                ListChange::Removed { first: matching[0], last: *matching.last().unwrap() }
            } else {
                ListChange::Reset
            };

            entries.retain(|entry| !predicate(entry));
            (matching.len(), change)
        };
        self.changes.emit(&change);
        removed
    }

    /// Removes every alert and announces a reset. A no-op on an empty model.
    pub fn clear(&self) {
        {
            let mut entries = self.entries.borrow_mut();
            if entries.is_empty() {
                return;
            }
            entries.clear();
        }
        self.changes.emit(&ListChange::Reset);
    }

    /// The alert with identifier `id`, if present.
    pub fn find(&self, id: &AlertId) -> Option<Rc<AlertConditionData>> {
        self.entries.borrow().iter().find(|entry| entry.id() == id).cloned()
    }

    /// The index of the alert with identifier `id`, if present.
    pub fn index_of(&self, id: &AlertId) -> Option<usize> {
        self.entries.borrow().iter().position(|entry| entry.id() == id)
    }

    /// A snapshot of the current entries, in model order.
    pub fn entries(&self) -> Vec<Rc<AlertConditionData>> {
        self.entries.borrow().clone()
    }

    /// Flips the `active` flag of alert `id`. Returns true when the flag
    /// changed (and an update was announced).
    pub fn set_active(&self, id: &AlertId, active: bool) -> bool {
        let index = {
            let entries = self.entries.borrow();
            let Some(index) = entries.iter().position(|entry| entry.id() == id) else {
                tracing::debug!(alert = %id, "set_active on an alert not in the model");
                return false;
            };
            if entries[index].active() == active {
                return false;
            }
            entries[index].set_active(active);
            index
        };
        self.changes.emit(&ListChange::Updated { first: index, last: index });
        true
    }

    /// Marks alert `id` as acknowledged. `viewed` only ever moves false to
    /// true here; the reset operations below are the sole way back.
    pub fn mark_viewed(&self, id: &AlertId) -> bool {
        self.set_viewed(id, true)
    }

    /// Explicit single-entry reset of the acknowledgment flag.
    pub fn reset_viewed(&self, id: &AlertId) -> bool {
        self.set_viewed(id, false)
    }

    /// Marks every alert as acknowledged. Emits one update covering the
    /// whole model when at least one flag changed.
    pub fn mark_all_viewed(&self) -> usize {
        self.set_all_viewed(true)
    }

    /// Explicit all-entries reset of the acknowledgment flag.
    pub fn reset_all_viewed(&self) -> usize {
        self.set_all_viewed(false)
    }

    /// Subscribes to structured change notifications.
    pub fn subscribe(&self, callback: impl Fn(&ListChange) + 'static) -> Subscription {
        self.changes.subscribe(callback)
    }

    fn set_viewed(&self, id: &AlertId, viewed: bool) -> bool {
        let index = {
            let entries = self.entries.borrow();
            let Some(index) = entries.iter().position(|entry| entry.id() == id) else {
                tracing::debug!(alert = %id, "viewed change on an alert not in the model");
                return false;
            };
            if entries[index].viewed() == viewed {
                return false;
            }
            entries[index].set_viewed(viewed);
            index
        };
        self.changes.emit(&ListChange::Updated { first: index, last: index });
        true
    }

    fn set_all_viewed(&self, viewed: bool) -> usize {
        let (changed, last) = {
            let entries = self.entries.borrow();
            let changed = entries.iter().filter(|entry| entry.viewed() != viewed).count();
            if changed == 0 {
                return 0;
            }
            for entry in entries.iter() {
                entry.set_viewed(viewed);
            }
            (changed, entries.len() - 1)
        };
        self.changes.emit(&ListChange::Updated { first: 0, last });
        changed
    }
}
