// src/core/handler/mod.rs

//! The polymorphic units of work a dispatch runs: one target action plus the four kinds of
//! interceptor around it.
//!
//! Every handler carries a priority (lower runs earlier) and a name. The name is the handler's
//! identity: two handlers with the same name are the same handler as far as deduplication
//! in an `OrderedHandlerList` is concerned.

pub mod chain;
pub mod ordered_list;
pub mod registry;

pub use ordered_list::OrderedHandlerList;
pub use registry::{InterceptorRegistry, SharedHandlerList};

use crate::core::context::ActionContext;
use crate::core::errors::{DispatchError, HandlerResult, Signal};
use crate::core::outcome::Outcome;
use async_trait::async_trait;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display};

/// The role a handler plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum HandlerKind {
    Before,
    Action,
    After,
    Exception,
    Finally,
}

/// What a `Visitor` sees of one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitNode<'a> {
    pub kind: HandlerKind,
    pub name: &'a str,
    pub priority: i32,
}

/// Diagnostic traversal over a dispatch pipeline.
pub trait Visitor {
    fn visit(&mut self, node: VisitNode<'_>);
}

/// Collects every visited node as `(kind, name)`.
#[derive(Debug, Default)]
pub struct RecordingVisitor {
    pub visited: Vec<(HandlerKind, String)>,
}

impl Visitor for RecordingVisitor {
    fn visit(&mut self, node: VisitNode<'_>) {
        self.visited.push((node.kind, node.name.to_string()));
    }
}

/// Behavior shared by all handler roles.
pub trait Handler: Send + Sync {
    /// Identity used for deduplication.
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    /// Releases anything the handler holds. Called once when its owner is destroyed.
    fn destroy(&self) {}

    fn accept(&self, kind: HandlerKind, visitor: &mut dyn Visitor) {
        visitor.visit(VisitNode {
            kind,
            name: self.name(),
            priority: self.priority(),
        });
    }
}

/// The target operation of a dispatch.
#[async_trait]
pub trait ActionHandler: Handler {
    async fn handle(&self, ctx: &mut ActionContext) -> HandlerResult;
}

/// Runs ahead of the action. The first `Some` outcome skips the rest of the Before chain and
/// the action itself.
#[async_trait]
pub trait BeforeInterceptor: Handler {
    async fn before(&self, ctx: &mut ActionContext) -> HandlerResult;
}

/// Runs after the action, receiving the current outcome and returning the next one.
#[async_trait]
pub trait AfterInterceptor: Handler {
    async fn after(&self, outcome: Option<Outcome>, ctx: &mut ActionContext) -> HandlerResult;
}

/// Offered any failure of the pipeline. The first `Some` outcome recovers it.
#[async_trait]
pub trait ExceptionInterceptor: Handler {
    async fn on_exception(&self, error: &DispatchError, ctx: &mut ActionContext)
    -> HandlerResult;
}

/// Always runs once the pipeline has been entered.
#[async_trait]
pub trait FinallyInterceptor: Handler {
    async fn finally(&self, ctx: &mut ActionContext) -> Result<(), Signal>;
}

/// One interceptor of any kind, for the registration entry points.
#[derive(Clone)]
pub enum Interceptor {
    Before(Arc<dyn BeforeInterceptor>),
    After(Arc<dyn AfterInterceptor>),
    Exception(Arc<dyn ExceptionInterceptor>),
    Finally(Arc<dyn FinallyInterceptor>),
}

impl Interceptor {
    pub fn before<T: BeforeInterceptor + 'static>(handler: T) -> Self {
        Interceptor::Before(Arc::new(handler))
    }

    pub fn after<T: AfterInterceptor + 'static>(handler: T) -> Self {
        Interceptor::After(Arc::new(handler))
    }

    pub fn exception<T: ExceptionInterceptor + 'static>(handler: T) -> Self {
        Interceptor::Exception(Arc::new(handler))
    }

    pub fn finally<T: FinallyInterceptor + 'static>(handler: T) -> Self {
        Interceptor::Finally(Arc::new(handler))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Interceptor::Before(_) => HandlerKind::Before,
            Interceptor::After(_) => HandlerKind::After,
            Interceptor::Exception(_) => HandlerKind::Exception,
            Interceptor::Finally(_) => HandlerKind::Finally,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Interceptor::Before(h) => h.name(),
            Interceptor::After(h) => h.name(),
            Interceptor::Exception(h) => h.name(),
            Interceptor::Finally(h) => h.name(),
        }
    }
}

impl From<Arc<dyn BeforeInterceptor>> for Interceptor {
    fn from(h: Arc<dyn BeforeInterceptor>) -> Self {
        Interceptor::Before(h)
    }
}

impl From<Arc<dyn AfterInterceptor>> for Interceptor {
    fn from(h: Arc<dyn AfterInterceptor>) -> Self {
        Interceptor::After(h)
    }
}

impl From<Arc<dyn ExceptionInterceptor>> for Interceptor {
    fn from(h: Arc<dyn ExceptionInterceptor>) -> Self {
        Interceptor::Exception(h)
    }
}

impl From<Arc<dyn FinallyInterceptor>> for Interceptor {
    fn from(h: Arc<dyn FinallyInterceptor>) -> Self {
        Interceptor::Finally(h)
    }
}
