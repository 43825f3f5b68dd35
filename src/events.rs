//! Typed publish/subscribe primitives for the alert graph.
//!
//! Sources, the list model, and the controllers communicate through explicit
//! event subscriptions with typed payloads rather than an inheritance-based
//! notification scheme. A [`Subscription`] detaches its callback when
//! dropped, so a subscriber that stores its source reference and its
//! subscription handle in the same owning structure releases both as one
//! unit.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// An ordered list of subscribers for one event type.
///
/// Emission is synchronous: every callback runs to completion before
/// [`Subscribers::emit`] returns. Callbacks registered during an emission do
/// not receive the in-flight event; callbacks detached during an emission
/// still receive it (delivery operates on a snapshot of the list).
pub struct Subscribers<E> {
    inner: Rc<RefCell<SubscriberList<E>>>,
}

struct SubscriberList<E> {
    next_id: u64,
    entries: Vec<(u64, Rc<dyn Fn(&E)>)>,
}

impl<E: 'static> Subscribers<E> {
    /// Creates an empty subscriber list.
    pub fn new() -> Self {
        Self { inner: Rc::new(RefCell::new(SubscriberList { next_id: 0, entries: Vec::new() })) }
    }

    /// Registers `callback` and returns the handle that keeps it attached.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = {
            let mut list = self.inner.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, Rc::new(callback)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || detach(&weak, id))
    }

    /// Delivers `event` to every currently attached subscriber.
    pub fn emit(&self, event: &E) {
        // Snapshot before delivery so callbacks may subscribe or detach
        // without holding the list borrowed.
        let callbacks: Vec<Rc<dyn Fn(&E)>> =
            self.inner.borrow().entries.iter().map(|(_, callback)| callback.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Detaches every subscriber. Outstanding [`Subscription`] handles become
    /// inert.
    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    /// Returns true when no subscriber is attached.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }
}

impl<E: 'static> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Subscribers<E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

fn detach<E>(list: &Weak<RefCell<SubscriberList<E>>>, id: u64) {
    if let Some(list) = list.upgrade() {
        list.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Keeps one subscriber attached; dropping it detaches the callback.
#[must_use = "dropping a Subscription immediately detaches its callback"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A handle that is not attached to anything. Returned where a
    /// subscription cannot be established (for example against an already
    /// invalidated source).
    pub fn detached() -> Self {
        Self { cancel: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("attached", &self.cancel.is_some()).finish()
    }
}
