// src/core/dispatch/mod.rs

//! Dispatch of one request to one target action through the scoped interceptor chains.

pub mod app;
pub mod container;
pub mod factory;
pub mod metadata;
pub mod proxy;
pub mod target;

pub use app::{App, AppBuilder};
pub use container::{AppInterceptorManager, ContainerInterceptors};
pub use factory::{HandlerCatalog, HandlerFactory};
pub use metadata::{
    ActionMetadata, ControllerMetadata, InterceptorMetadata, MetadataProvider, StaticMetadata,
};
pub use proxy::{DispatchProxy, DispatchProxyBuilder};
pub use target::TargetId;
