//! Subscriber registry for playback notifications.
//!
//! Handlers are called without any lock held, so a handler may subscribe,
//! unsubscribe or drive the player re-entrantly.

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::Arc;

new_key_type! {
    /// Handle returned by a subscription, used to unsubscribe.
    pub struct SubscriptionId;
}

/// Boxed notification handler
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of handlers receiving `&T` notifications.
pub struct Subscribers<T> {
    handlers: RwLock<SlotMap<SubscriptionId, Handler<T>>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(SlotMap::with_key()),
        }
    }

    /// Register a handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.handlers.write().insert(Arc::new(handler))
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Call every handler registered at the time of the call.
    pub fn emit(&self, value: &T) {
        self.emit_each(|handler| handler(value));
    }

    /// Pass each currently registered handler to `call`, with no lock held.
    pub fn emit_each<F>(&self, mut call: F)
    where
        F: FnMut(&Handler<T>),
    {
        let snapshot: SmallVec<[Handler<T>; 4]> =
            self.handlers.read().values().cloned().collect();
        for handler in &snapshot {
            call(handler);
        }
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}
