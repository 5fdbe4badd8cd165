// src/core/handler/registry.rs

//! Concurrency-safe interceptor registries.
//!
//! Registries are read on every request and written rarely, so each list is published as an
//! immutable snapshot behind an `RwLock<Arc<_>>`. A reader clones the `Arc` under a brief read
//! lock and then iterates without holding anything; a writer copies the current list,
//! inserts, and swaps the new snapshot in. Readers never see a half-updated list and no lock
//! is held across an `.await`.

use super::{
    AfterInterceptor, BeforeInterceptor, ExceptionInterceptor, FinallyInterceptor, Handler,
    HandlerKind, Interceptor, OrderedHandlerList,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// A copy-on-write `OrderedHandlerList`.
pub struct SharedHandlerList<T: ?Sized> {
    inner: RwLock<Arc<OrderedHandlerList<T>>>,
}

impl<T: ?Sized> Default for SharedHandlerList<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Arc::new(OrderedHandlerList::default())),
        }
    }
}

impl<T: ?Sized + Handler> SharedHandlerList<T> {
    /// The current list. Later registrations do not affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<OrderedHandlerList<T>> {
        Arc::clone(&*self.inner.read())
    }

    pub fn insert(&self, handler: Arc<T>) -> bool {
        let mut guard = self.inner.write();
        let mut next = OrderedHandlerList::clone(&**guard);
        let inserted = next.insert(handler);
        if inserted {
            *guard = Arc::new(next);
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Destroys every handler and leaves the list empty.
    pub fn release(&self) {
        let old = std::mem::take(&mut *self.inner.write());
        for handler in old.iter() {
            handler.destroy();
        }
    }
}

/// The four interceptor lists of one scope.
#[derive(Default)]
pub struct InterceptorRegistry {
    before: SharedHandlerList<dyn BeforeInterceptor>,
    after: SharedHandlerList<dyn AfterInterceptor>,
    exception: SharedHandlerList<dyn ExceptionInterceptor>,
    finally: SharedHandlerList<dyn FinallyInterceptor>,
}

static PROCESS_REGISTRY: Lazy<Arc<InterceptorRegistry>> =
    Lazy::new(|| Arc::new(InterceptorRegistry::new()));

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide global scope.
    pub fn process() -> Arc<InterceptorRegistry> {
        Arc::clone(&*PROCESS_REGISTRY)
    }

    /// Inserts the interceptor into the list of its kind. Returns `false` for a duplicate.
    pub fn register(&self, interceptor: Interceptor) -> bool {
        let kind = interceptor.kind();
        let name = interceptor.name().to_string();
        let inserted = match interceptor {
            Interceptor::Before(h) => self.before.insert(h),
            Interceptor::After(h) => self.after.insert(h),
            Interceptor::Exception(h) => self.exception.insert(h),
            Interceptor::Finally(h) => self.finally.insert(h),
        };
        debug!(%kind, interceptor = %name, inserted, "registered interceptor");
        inserted
    }

    pub fn before(&self) -> Arc<OrderedHandlerList<dyn BeforeInterceptor>> {
        self.before.snapshot()
    }

    pub fn after(&self) -> Arc<OrderedHandlerList<dyn AfterInterceptor>> {
        self.after.snapshot()
    }

    pub fn exception(&self) -> Arc<OrderedHandlerList<dyn ExceptionInterceptor>> {
        self.exception.snapshot()
    }

    pub fn finally(&self) -> Arc<OrderedHandlerList<dyn FinallyInterceptor>> {
        self.finally.snapshot()
    }

    pub fn len(&self, kind: HandlerKind) -> usize {
        match kind {
            HandlerKind::Before => self.before.len(),
            HandlerKind::After => self.after.len(),
            HandlerKind::Exception => self.exception.len(),
            HandlerKind::Finally => self.finally.len(),
            HandlerKind::Action => 0,
        }
    }

    /// Destroys and clears all four lists.
    pub fn release(&self) {
        self.after.release();
        self.before.release();
        self.exception.release();
        self.finally.release();
    }
}

/// Registers an interceptor in the process-wide global scope.
pub fn register_global_interceptor(interceptor: impl Into<Interceptor>) -> bool {
    PROCESS_REGISTRY.register(interceptor.into())
}

/// Clears the process-wide global scope at shutdown.
pub fn release_global_resources() {
    PROCESS_REGISTRY.release();
}
