// src/core/dispatch/container.rs

//! The container (application) scope of interceptors, between the global and local scopes.

use crate::config::FinallyMode;
use crate::core::context::ActionContext;
use crate::core::errors::DispatchError;
use crate::core::handler::{Interceptor, InterceptorRegistry, chain};
use crate::core::outcome::Outcome;
use async_trait::async_trait;

/// Container-scope interception, with the same short-circuit and fold rules as a local chain.
#[async_trait]
pub trait ContainerInterceptors: Send + Sync {
    async fn handle_before(&self, ctx: &mut ActionContext)
    -> Result<Option<Outcome>, DispatchError>;

    async fn handle_after(
        &self,
        outcome: Option<Outcome>,
        ctx: &mut ActionContext,
    ) -> Result<Option<Outcome>, DispatchError>;

    async fn handle_exception(&self, err: &DispatchError, ctx: &mut ActionContext)
    -> Option<Outcome>;

    async fn handle_finally(
        &self,
        ctx: &mut ActionContext,
        mode: FinallyMode,
    ) -> Result<(), DispatchError>;

    /// Called when the owning application is destroyed.
    fn release(&self) {}
}

/// The default container scope: one `InterceptorRegistry` owned by the application.
#[derive(Default)]
pub struct AppInterceptorManager {
    registry: InterceptorRegistry,
}

impl AppInterceptorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, interceptor: Interceptor) -> bool {
        self.registry.register(interceptor)
    }

    pub fn registry(&self) -> &InterceptorRegistry {
        &self.registry
    }
}

#[async_trait]
impl ContainerInterceptors for AppInterceptorManager {
    async fn handle_before(
        &self,
        ctx: &mut ActionContext,
    ) -> Result<Option<Outcome>, DispatchError> {
        let list = self.registry.before();
        chain::run_before(list.as_slice(), ctx).await
    }

    async fn handle_after(
        &self,
        outcome: Option<Outcome>,
        ctx: &mut ActionContext,
    ) -> Result<Option<Outcome>, DispatchError> {
        let list = self.registry.after();
        chain::run_after(list.as_slice(), outcome, ctx).await
    }

    async fn handle_exception(
        &self,
        err: &DispatchError,
        ctx: &mut ActionContext,
    ) -> Option<Outcome> {
        let list = self.registry.exception();
        chain::run_exception(list.as_slice(), err, ctx).await
    }

    async fn handle_finally(
        &self,
        ctx: &mut ActionContext,
        mode: FinallyMode,
    ) -> Result<(), DispatchError> {
        let list = self.registry.finally();
        chain::run_finally(list.as_slice(), ctx, mode).await
    }

    fn release(&self) {
        self.registry.release();
    }
}
