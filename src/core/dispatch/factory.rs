// src/core/dispatch/factory.rs

//! Turns metadata into runnable handlers.

use super::metadata::{ActionMetadata, InterceptorMetadata};
use crate::config::Mode;
use crate::core::errors::DispatchError;
use crate::core::handler::{
    ActionHandler, AfterInterceptor, BeforeInterceptor, ExceptionInterceptor, FinallyInterceptor,
    HandlerKind, Interceptor,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Creates the handlers a dispatch proxy materializes. Called once per proxy.
pub trait HandlerFactory: Send + Sync {
    fn create_action(
        &self,
        meta: &ActionMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ActionHandler>, DispatchError>;

    fn create_before(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn BeforeInterceptor>, DispatchError>;

    fn create_after(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn AfterInterceptor>, DispatchError>;

    fn create_exception(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ExceptionInterceptor>, DispatchError>;

    fn create_finally(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn FinallyInterceptor>, DispatchError>;
}

/// A `HandlerFactory` that hands out pre-built handlers by name.
///
/// Actions are keyed by their `controller.action` path, interceptors by their own name.
#[derive(Default)]
pub struct HandlerCatalog {
    actions: DashMap<String, Arc<dyn ActionHandler>>,
    before: DashMap<String, Arc<dyn BeforeInterceptor>>,
    after: DashMap<String, Arc<dyn AfterInterceptor>>,
    exception: DashMap<String, Arc<dyn ExceptionInterceptor>>,
    finally: DashMap<String, Arc<dyn FinallyInterceptor>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<A: ActionHandler + 'static>(&self, path: impl Into<String>, action: A) {
        self.actions.insert(path.into(), Arc::new(action));
    }

    /// Makes an interceptor available under its own name.
    pub fn register(&self, interceptor: Interceptor) {
        let name = interceptor.name().to_string();
        match interceptor {
            Interceptor::Before(h) => {
                self.before.insert(name, h);
            }
            Interceptor::After(h) => {
                self.after.insert(name, h);
            }
            Interceptor::Exception(h) => {
                self.exception.insert(name, h);
            }
            Interceptor::Finally(h) => {
                self.finally.insert(name, h);
            }
        }
    }
}

fn lookup<T: ?Sized>(
    map: &DashMap<String, Arc<T>>,
    kind: HandlerKind,
    name: &str,
    mode: Mode,
) -> Result<Arc<T>, DispatchError> {
    if let Some(found) = map.get(name) {
        return Ok(Arc::clone(found.value()));
    }
    if mode.is_dev() {
        let known: Vec<String> = map.iter().map(|e| e.key().clone()).collect();
        warn!(%kind, name, ?known, "no handler registered under this name");
    }
    Err(DispatchError::HandlerNotFound {
        kind,
        name: name.to_string(),
    })
}

impl HandlerFactory for HandlerCatalog {
    fn create_action(
        &self,
        meta: &ActionMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ActionHandler>, DispatchError> {
        lookup(&self.actions, HandlerKind::Action, &meta.path(), mode)
    }

    fn create_before(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn BeforeInterceptor>, DispatchError> {
        lookup(&self.before, HandlerKind::Before, &meta.name, mode)
    }

    fn create_after(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn AfterInterceptor>, DispatchError> {
        lookup(&self.after, HandlerKind::After, &meta.name, mode)
    }

    fn create_exception(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ExceptionInterceptor>, DispatchError> {
        lookup(&self.exception, HandlerKind::Exception, &meta.name, mode)
    }

    fn create_finally(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn FinallyInterceptor>, DispatchError> {
        lookup(&self.finally, HandlerKind::Finally, &meta.name, mode)
    }
}
