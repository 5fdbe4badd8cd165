// src/core/dispatch/proxy.rs

//! The dispatch orchestrator for one `controller.action` target.
//!
//! A `DispatchProxy` is shared by every concurrent request for its target. On first use it
//! materializes the target handler and the four local interceptor lists exactly once; after
//! that the chain is read-only. Each request then runs:
//!
//! 1. the cache lookup (a hit is rendered directly and nothing else runs),
//! 2. Before: global, container, local (first outcome wins, the action is skipped),
//! 3. the action,
//! 4. After: local, container, global (a fold, every handler runs),
//! 5. rendering (a missing outcome renders as `Outcome::NoResult`),
//! 6. Finally: local, container, global, whatever happened in 2 to 5.
//!
//! Any failure in 2 to 5 is offered to the Exception chain (local, container, global). If no
//! scope recovers it, an internal-error outcome is rendered instead. If rendering that fails
//! too, one last error outcome is rendered and its failure is only logged.

use super::app::App;
use super::container::ContainerInterceptors;
use super::factory::HandlerFactory;
use super::metadata::MetadataProvider;
use super::target::TargetId;
use crate::config::{FinallyMode, Mode};
use crate::core::cache::{CacheStore, CacheStrategy};
use crate::core::context::ActionContext;
use crate::core::errors::{DispatchError, settle};
use crate::core::handler::{
    ActionHandler, AfterInterceptor, BeforeInterceptor, ExceptionInterceptor, FinallyInterceptor,
    Handler, HandlerKind, Interceptor, InterceptorRegistry, OrderedHandlerList, Visitor, chain,
    registry,
};
use crate::core::metrics;
use crate::core::outcome::Outcome;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

/// The four interceptor lists of the local scope.
#[derive(Clone, Default)]
struct LocalChains {
    before: OrderedHandlerList<dyn BeforeInterceptor>,
    after: OrderedHandlerList<dyn AfterInterceptor>,
    exception: OrderedHandlerList<dyn ExceptionInterceptor>,
    finally: OrderedHandlerList<dyn FinallyInterceptor>,
}

impl LocalChains {
    fn insert(&mut self, interceptor: Interceptor) -> bool {
        match interceptor {
            Interceptor::Before(h) => self.before.insert(h),
            Interceptor::After(h) => self.after.insert(h),
            Interceptor::Exception(h) => self.exception.insert(h),
            Interceptor::Finally(h) => self.finally.insert(h),
        }
    }

    fn destroy_all(&self) {
        self.before.iter().for_each(|h| h.destroy());
        self.after.iter().for_each(|h| h.destroy());
        self.exception.iter().for_each(|h| h.destroy());
        self.finally.iter().for_each(|h| h.destroy());
    }
}

/// The materialized state: target handler plus local chains, immutable once built.
struct Agents {
    action: Arc<dyn ActionHandler>,
    local: LocalChains,
}

pub struct DispatchProxyBuilder<'a> {
    target: String,
    app: &'a App,
    cache_strategy: Option<CacheStrategy>,
    seeds: LocalChains,
}

impl DispatchProxyBuilder<'_> {
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = Some(strategy);
        self
    }

    pub fn use_session_cache(self) -> Self {
        self.cache_strategy(CacheStrategy::SessionScoped)
    }

    pub fn use_global_cache(self) -> Self {
        self.cache_strategy(CacheStrategy::GlobalScoped)
    }

    /// Adds a local interceptor ahead of those the controller metadata declares.
    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.seeds.insert(interceptor);
        self
    }

    /// Validates the target. A malformed identifier is a configuration error.
    pub fn build(self) -> Result<DispatchProxy, DispatchError> {
        let target = TargetId::parse(&self.target)?;
        let app = self.app;
        let config = app.config();
        Ok(DispatchProxy {
            path: target.to_string(),
            target,
            app_name: Arc::clone(app.name()),
            mode: app.mode(),
            finally_mode: config.dispatch.finally_mode,
            cache: app.cache_service(&config.cache.name),
            cache_strategy: self
                .cache_strategy
                .unwrap_or(config.dispatch.cache_strategy),
            container: Arc::clone(app.interceptor_manager()),
            metadata: Arc::clone(app.metadata()),
            factory: Arc::clone(app.factory()),
            globals: Arc::clone(app.globals()),
            seeds: self.seeds,
            agents: OnceCell::new(),
            destroyed: AtomicBool::new(false),
        })
    }
}

pub struct DispatchProxy {
    target: TargetId,
    path: String,
    app_name: Arc<str>,
    mode: Mode,
    finally_mode: FinallyMode,
    cache: Arc<dyn CacheStore>,
    cache_strategy: CacheStrategy,
    container: Arc<dyn ContainerInterceptors>,
    metadata: Arc<dyn MetadataProvider>,
    factory: Arc<dyn HandlerFactory>,
    globals: Arc<InterceptorRegistry>,
    seeds: LocalChains,
    agents: OnceCell<Agents>,
    destroyed: AtomicBool,
}

impl fmt::Debug for DispatchProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchProxy")
            .field("target", &self.path)
            .field("cache_strategy", &self.cache_strategy)
            .field("ready", &self.is_ready())
            .field("destroyed", &self.destroyed.load(Ordering::Acquire))
            .finish()
    }
}

impl fmt::Display for DispatchProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl DispatchProxy {
    pub fn builder<'a>(target: &str, app: &'a App) -> DispatchProxyBuilder<'a> {
        DispatchProxyBuilder {
            target: target.to_string(),
            app,
            cache_strategy: None,
            seeds: LocalChains::default(),
        }
    }

    pub fn new(target: &str, app: &App) -> Result<Self, DispatchError> {
        Self::builder(target, app).build()
    }

    /// Registers an interceptor in the process-wide global scope.
    pub fn register_global_interceptor(interceptor: impl Into<Interceptor>) -> bool {
        registry::register_global_interceptor(interceptor)
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn controller(&self) -> &str {
        self.target.controller()
    }

    pub fn action(&self) -> &str {
        self.target.action()
    }

    pub fn cache_strategy(&self) -> CacheStrategy {
        self.cache_strategy
    }

    pub fn is_ready(&self) -> bool {
        self.agents.initialized()
    }

    /// Runs the full dispatch lifecycle for one request.
    ///
    /// Every outcome, including recovered failures, is rendered into `ctx`. The only error
    /// returned is a failure of the Finally chain. Dropping this future mid-flight may skip the
    /// Finally chain; `spawn` runs a dispatch that cannot be cancelled.
    pub async fn handle(&self, ctx: &mut ActionContext) -> Result<(), DispatchError> {
        let span = info_span!("dispatch", action = %self.path);
        async move {
            let start_time = Instant::now();
            metrics::DISPATCH_TOTAL.inc();

            if self.destroyed.load(Ordering::Acquire) {
                warn!("dispatch on a destroyed proxy");
                self.recover(DispatchError::Destroyed(self.path.clone()), ctx)
                    .await;
                return Ok(());
            }

            if let Some(outcome) = self.cache_strategy.cached(ctx, self.cache.as_ref()) {
                debug!("serving cached outcome");
                if let Err(e) = self.on_result(&outcome, ctx) {
                    error!("Error rendering cached result: {}", e);
                    metrics::DISPATCH_ERRORS_TOTAL
                        .with_label_values(&[metrics::stage::RENDER])
                        .inc();
                    self.recover(e, ctx).await;
                }
                metrics::DISPATCH_LATENCY_SECONDS.observe(start_time.elapsed().as_secs_f64());
                return Ok(());
            }

            let pipeline = AssertUnwindSafe(self.run_pipeline(ctx)).catch_unwind().await;
            let failure = match pipeline {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(DispatchError::Panicked(panic_message(payload.as_ref()))),
            };
            if let Some(e) = failure {
                error!("Error handling request: {}", e);
                let stage = match e {
                    DispatchError::Render(_) => metrics::stage::RENDER,
                    _ => metrics::stage::ACTION,
                };
                metrics::DISPATCH_ERRORS_TOTAL
                    .with_label_values(&[stage])
                    .inc();
                self.recover(e, ctx).await;
            }

            let result = self.handle_finally(ctx).await;
            metrics::DISPATCH_LATENCY_SECONDS.observe(start_time.elapsed().as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }

    /// Runs `handle` on its own task, which owns the context. Neither dropping nor aborting
    /// the returned handle cancels the dispatch, so the Finally chain still runs.
    pub fn spawn(
        self: Arc<Self>,
        mut ctx: ActionContext,
    ) -> JoinHandle<(ActionContext, Result<(), DispatchError>)> {
        let dispatch = tokio::spawn(async move {
            let result = self.handle(&mut ctx).await;
            (ctx, result)
        });
        // Aborting this outer task only detaches `dispatch`.
        tokio::spawn(async move {
            match dispatch.await {
                Ok(done) => done,
                Err(e) => match e.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    Err(e) => std::panic::resume_unwind(Box::new(e.to_string())),
                },
            }
        })
    }

    /// Visits global Before, local Before, the action, local and global After, local and
    /// global Finally, then local and global Exception handlers, in that order.
    pub async fn accept(&self, visitor: &mut dyn Visitor) -> Result<(), DispatchError> {
        let agents = self.ensure_ready().await?;
        self.globals.before().accept(HandlerKind::Before, visitor);
        agents.local.before.accept(HandlerKind::Before, visitor);
        agents.action.accept(HandlerKind::Action, visitor);
        agents.local.after.accept(HandlerKind::After, visitor);
        self.globals.after().accept(HandlerKind::After, visitor);
        agents.local.finally.accept(HandlerKind::Finally, visitor);
        self.globals.finally().accept(HandlerKind::Finally, visitor);
        agents.local.exception.accept(HandlerKind::Exception, visitor);
        self.globals.exception().accept(HandlerKind::Exception, visitor);
        Ok(())
    }

    /// Releases the target handler and every local interceptor. The proxy is unusable
    /// afterwards.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.agents.get() {
            Some(agents) => {
                agents.local.destroy_all();
                agents.action.destroy();
            }
            None => self.seeds.destroy_all(),
        }
        debug!(action = %self.path, "dispatch proxy destroyed");
    }

    async fn run_pipeline(&self, ctx: &mut ActionContext) -> Result<(), DispatchError> {
        let agents = self.ensure_ready().await?;
        // Downstream rendering resolves default view names from this.
        ctx.set_action_path(self.path.clone());

        let mut outcome = self.handle_before(agents, ctx).await?;
        if outcome.is_none() {
            outcome = settle(agents.action.handle(ctx).await)?;
        }
        let after = self.handle_after(agents, outcome.clone(), ctx).await?;
        let outcome = after.or(outcome).unwrap_or(Outcome::NoResult);
        self.on_result(&outcome, ctx)
    }

    async fn ensure_ready(&self) -> Result<&Agents, DispatchError> {
        self.agents
            .get_or_try_init(|| async { self.materialize() })
            .await
    }

    fn materialize(&self) -> Result<Agents, DispatchError> {
        let controller = self
            .metadata
            .controller(self.target.controller())
            .ok_or_else(|| DispatchError::ControllerNotFound(self.target.controller().into()))?;
        let action_meta =
            controller
                .action(self.target.action())
                .ok_or_else(|| DispatchError::ActionNotFound {
                    controller: self.target.controller().into(),
                    action: self.target.action().into(),
                })?;
        let action = self.factory.create_action(action_meta, self.mode)?;

        let mut local = self.seeds.clone();
        for info in &controller.before {
            local.before.insert(self.factory.create_before(info, self.mode)?);
        }
        for info in &controller.after {
            local.after.insert(self.factory.create_after(info, self.mode)?);
        }
        for info in &controller.exception {
            local
                .exception
                .insert(self.factory.create_exception(info, self.mode)?);
        }
        for info in &controller.finally {
            local
                .finally
                .insert(self.factory.create_finally(info, self.mode)?);
        }

        metrics::MATERIALIZATIONS_TOTAL.inc();
        debug!(
            before = local.before.len(),
            after = local.after.len(),
            exception = local.exception.len(),
            finally = local.finally.len(),
            "materialized handler chain"
        );
        Ok(Agents { action, local })
    }

    async fn handle_before(
        &self,
        agents: &Agents,
        ctx: &mut ActionContext,
    ) -> Result<Option<Outcome>, DispatchError> {
        let global = self.globals.before();
        if let Some(outcome) = chain::run_before(global.as_slice(), ctx).await? {
            return Ok(Some(outcome));
        }
        if let Some(outcome) = self.container.handle_before(ctx).await? {
            return Ok(Some(outcome));
        }
        chain::run_before(agents.local.before.as_slice(), ctx).await
    }

    async fn handle_after(
        &self,
        agents: &Agents,
        outcome: Option<Outcome>,
        ctx: &mut ActionContext,
    ) -> Result<Option<Outcome>, DispatchError> {
        let outcome = chain::run_after(agents.local.after.as_slice(), outcome, ctx).await?;
        let outcome = self.container.handle_after(outcome, ctx).await?;
        let global = self.globals.after();
        chain::run_after(global.as_slice(), outcome, ctx).await
    }

    async fn handle_exception(&self, err: &DispatchError, ctx: &mut ActionContext) -> Option<Outcome> {
        if let Some(agents) = self.agents.get()
            && let Some(outcome) =
                chain::run_exception(agents.local.exception.as_slice(), err, ctx).await
        {
            return Some(outcome);
        }
        if let Some(outcome) = self.container.handle_exception(err, ctx).await {
            return Some(outcome);
        }
        let global = self.globals.exception();
        chain::run_exception(global.as_slice(), err, ctx).await
    }

    async fn handle_finally(&self, ctx: &mut ActionContext) -> Result<(), DispatchError> {
        let mode = self.finally_mode;
        let scopes = async {
            let global = self.globals.finally();
            let local: &[Arc<dyn FinallyInterceptor>] = match self.agents.get() {
                Some(agents) => agents.local.finally.as_slice(),
                None => &[],
            };
            match mode {
                FinallyMode::Compat => {
                    chain::run_finally(local, ctx, mode).await?;
                    self.container.handle_finally(ctx, mode).await?;
                    chain::run_finally(global.as_slice(), ctx, mode).await
                }
                FinallyMode::RunAll => {
                    let local = chain::run_finally(local, ctx, mode).await;
                    let container = self.container.handle_finally(ctx, mode).await;
                    let global = chain::run_finally(global.as_slice(), ctx, mode).await;
                    local.and(container).and(global)
                }
            }
        };
        let result = match AssertUnwindSafe(scopes).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
        };
        if let Err(e) = &result {
            error!("Error running finally interceptors: {}", e);
            metrics::DISPATCH_ERRORS_TOTAL
                .with_label_values(&[metrics::stage::FINALLY])
                .inc();
        }
        result
    }

    /// Turns an unrecovered failure into a rendered outcome. Never fails.
    async fn recover(&self, err: DispatchError, ctx: &mut ActionContext) {
        let recovered = AssertUnwindSafe(self.handle_exception(&err, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                error!(
                    "Exception interceptor panicked: {}",
                    panic_message(payload.as_ref())
                );
                None
            });
        let outcome = recovered.unwrap_or_else(|| self.server_error(err));
        if let Err(e) = self.on_result(&outcome, ctx) {
            error!("Error rendering exception handle result: {}", e);
            metrics::DISPATCH_ERRORS_TOTAL
                .with_label_values(&[metrics::stage::ERROR_RENDER])
                .inc();
            if let Err(last) = self.on_result(&self.server_error(e), ctx) {
                error!("Error rendering fallback server error: {}", last);
            }
        }
    }

    fn server_error(&self, cause: DispatchError) -> Outcome {
        Outcome::server_error(cause, Arc::clone(&self.app_name), self.mode.is_dev())
    }

    /// Renders `outcome`, dissolving the context before and destroying it after. A failed
    /// render forgets the cached template and leaves the context alive.
    fn on_result(&self, outcome: &Outcome, ctx: &mut ActionContext) -> Result<(), DispatchError> {
        ctx.dissolve();
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| ctx.render(outcome)))
            .unwrap_or_else(|payload| {
                Err(DispatchError::Panicked(panic_message(payload.as_ref())))
            });
        if let Err(e) = rendered {
            ctx.cache_template(None);
            return Err(e);
        }
        ctx.destroy();
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
