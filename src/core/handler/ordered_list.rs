// src/core/handler/ordered_list.rs

//! An insertion-ordered handler list kept sorted by priority.

use super::{Handler, HandlerKind, Visitor};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Handlers of one kind, ascending by priority, at most one per name.
///
/// Ties are not broken by any secondary key: a handler whose priority equals an existing
/// one lands immediately before the first such handler found by the scan. Final order among
/// equal priorities therefore depends on registration order.
pub struct OrderedHandlerList<T: ?Sized> {
    handlers: Vec<Arc<T>>,
}

impl<T: ?Sized> Default for OrderedHandlerList<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T: ?Sized> Clone for OrderedHandlerList<T> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<T: ?Sized + Handler> fmt::Debug for OrderedHandlerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| (h.name(), h.priority())))
            .finish()
    }
}

impl<T: ?Sized + Handler> OrderedHandlerList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `handler` at its priority position. Returns `false` if a handler with the same
    /// name is already present, whatever its priority.
    pub fn insert(&mut self, handler: Arc<T>) -> bool {
        if self.handlers.is_empty() {
            self.handlers.push(handler);
            return true;
        }
        if self.contains(handler.name()) {
            return false;
        }
        let priority = handler.priority();
        let position = self
            .handlers
            .iter()
            .position(|existing| priority.cmp(&existing.priority()) != Ordering::Greater);
        match position {
            Some(i) => self.handlers.insert(i, handler),
            None => self.handlers.push(handler),
        }
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.iter().any(|h| h.name() == name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<T>> {
        self.handlers.iter()
    }

    pub fn as_slice(&self) -> &[Arc<T>] {
        &self.handlers
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn accept(&self, kind: HandlerKind, visitor: &mut dyn Visitor) {
        for handler in &self.handlers {
            handler.accept(kind, visitor);
        }
    }

    /// Destroys and drops every handler.
    pub fn release(&mut self) {
        for handler in self.handlers.drain(..) {
            handler.destroy();
        }
    }
}

impl<'a, T: ?Sized> IntoIterator for &'a OrderedHandlerList<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handlers.iter()
    }
}
