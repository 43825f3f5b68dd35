//! Tool controller for the count of unviewed, active alerts.
//!
//! The count is deliberately not maintained incrementally: every structured
//! notification from the list model triggers a full O(n) rescan, trading a
//! cheap recomputation over a small collection for freedom from
//! incremental-bookkeeping drift.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    engine::list_model::AlertListModel,
    events::{Subscribers, Subscription},
    registry::{Tool, ToolRegistry},
};

/// Reports how many alerts are active but not yet acknowledged.
pub struct ViewedAlertsController {
    model: Rc<AlertListModel>,
    count: Cell<usize>,
    count_changed: Subscribers<usize>,
    model_subscription: RefCell<Option<Subscription>>,
}

impl ViewedAlertsController {
    /// Creates the controller, registers it with the tool registry, and
    /// subscribes to the model.
    ///
    /// When the model already holds entries, an initial count event is
    /// emitted immediately so late subscribers never act on a stale zero.
    pub fn new(model: &Rc<AlertListModel>, registry: &ToolRegistry) -> Rc<Self> {
        let controller = Rc::new(Self {
            model: model.clone(),
            count: Cell::new(0),
            count_changed: Subscribers::new(),
            model_subscription: RefCell::new(None),
        });
        registry.register(controller.clone());

        let weak = Rc::downgrade(&controller);
        let subscription = model.subscribe(move |_| {
            if let Some(controller) = weak.upgrade() {
                controller.recompute();
            }
        });
        *controller.model_subscription.borrow_mut() = Some(subscription);

        controller.count.set(controller.scan());
        if !model.is_empty() {
            controller.count_changed.emit(&controller.count.get());
        }
        controller
    }

    /// The number of alerts that are active and have not been marked viewed.
    pub fn unviewed_active_count(&self) -> usize {
        self.count.get()
    }

    /// Subscribes to count events. The payload is the freshly recomputed
    /// count; an event fires after every model notification.
    pub fn on_count_changed(&self, callback: impl Fn(&usize) + 'static) -> Subscription {
        self.count_changed.subscribe(callback)
    }

    fn recompute(&self) {
        let count = self.scan();
        self.count.set(count);
        self.count_changed.emit(&count);
    }

    fn scan(&self) -> usize {
        self.model
            .entries()
            .iter()
            .filter(|alert| alert.active() && !alert.viewed())
            .count()
    }
}

impl Tool for ViewedAlertsController {
    fn name(&self) -> &str {
        "viewed alerts"
    }
}
