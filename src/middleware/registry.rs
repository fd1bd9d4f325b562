// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Ordered, identity-unique middleware registry

use std::sync::Arc;

use parking_lot::RwLock;

/// Middleware registered for one intercepted primitive
///
/// Entries are `Arc`s and identity is pointer identity: registering the same
/// `Arc` twice is a no-op, while two separately allocated but otherwise equal
/// middleware are distinct entries. Insertion order is execution order.
pub struct Registry<M: ?Sized> {
    entries: RwLock<Vec<Arc<M>>>,
}

impl<M: ?Sized> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> Registry<M> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append `middleware` unless it is already registered
    ///
    /// Returns whether the entry was added.
    pub fn subscribe(&self, middleware: Arc<M>) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|m| Arc::ptr_eq(m, &middleware)) {
            return false;
        }
        entries.push(middleware);
        true
    }

    /// Remove every entry identical to `middleware`, keeping the others in order
    pub fn unsubscribe(&self, middleware: &Arc<M>) {
        self.entries.write().retain(|m| !Arc::ptr_eq(m, middleware));
    }

    /// Register `middleware` and hand back a handle that removes it again
    pub fn on_request(self: &Arc<Self>, middleware: Arc<M>) -> Subscription<M> {
        self.subscribe(middleware.clone());
        Subscription {
            registry: self.clone(),
            middleware,
        }
    }

    /// Copy of the current entries, taken at the start of every pipeline run
    pub fn snapshot(&self) -> Vec<Arc<M>> {
        self.entries.read().clone()
    }

    /// Whether `middleware` is registered
    pub fn contains(&self, middleware: &Arc<M>) -> bool {
        self.entries.read().iter().any(|m| Arc::ptr_eq(m, middleware))
    }

    /// Number of registered middleware
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Unsubscribe handle returned by `on_request`
pub struct Subscription<M: ?Sized> {
    registry: Arc<Registry<M>>,
    middleware: Arc<M>,
}

impl<M: ?Sized> Subscription<M> {
    /// Remove the middleware; calling this more than once is harmless
    pub fn unsubscribe(&self) {
        self.registry.unsubscribe(&self.middleware);
    }

    /// The subscribed middleware
    pub fn middleware(&self) -> &Arc<M> {
        &self.middleware
    }
}

impl<M: ?Sized> Clone for Subscription<M> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            middleware: self.middleware.clone(),
        }
    }
}
