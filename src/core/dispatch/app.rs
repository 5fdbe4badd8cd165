// src/core/dispatch/app.rs

//! The owning application of a set of dispatch proxies.

use super::container::{AppInterceptorManager, ContainerInterceptors};
use super::factory::HandlerFactory;
use super::metadata::MetadataProvider;
use super::proxy::{DispatchProxy, DispatchProxyBuilder};
use super::target::TargetId;
use crate::config::{Config, Mode};
use crate::core::cache::{CacheStore, MemoryCacheStore};
use crate::core::errors::DispatchError;
use crate::core::handler::InterceptorRegistry;
use dashmap::DashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

/// Holds the collaborators every proxy of an application shares and owns the proxies
/// themselves.
pub struct App {
    name: Arc<str>,
    config: Config,
    interceptors: Arc<dyn ContainerInterceptors>,
    metadata: Arc<dyn MetadataProvider>,
    factory: Arc<dyn HandlerFactory>,
    globals: Arc<InterceptorRegistry>,
    cache_services: DashMap<String, Arc<dyn CacheStore>>,
    proxies: DashMap<TargetId, Arc<DispatchProxy>>,
}

pub struct AppBuilder {
    config: Config,
    metadata: Arc<dyn MetadataProvider>,
    factory: Arc<dyn HandlerFactory>,
    interceptors: Option<Arc<dyn ContainerInterceptors>>,
    globals: Option<Arc<InterceptorRegistry>>,
}

impl AppBuilder {
    /// Replaces the default `AppInterceptorManager`.
    pub fn interceptors(mut self, interceptors: Arc<dyn ContainerInterceptors>) -> Self {
        self.interceptors = Some(interceptors);
        self
    }

    /// Reads global interceptors from `globals` instead of the process-wide registry.
    pub fn globals(mut self, globals: Arc<InterceptorRegistry>) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn build(self) -> App {
        App {
            name: Arc::from(self.config.app_name.as_str()),
            interceptors: self
                .interceptors
                .unwrap_or_else(|| Arc::new(AppInterceptorManager::new())),
            globals: self.globals.unwrap_or_else(InterceptorRegistry::process),
            metadata: self.metadata,
            factory: self.factory,
            config: self.config,
            cache_services: DashMap::new(),
            proxies: DashMap::new(),
        }
    }
}

impl App {
    pub fn builder(
        config: Config,
        metadata: Arc<dyn MetadataProvider>,
        factory: Arc<dyn HandlerFactory>,
    ) -> AppBuilder {
        AppBuilder {
            config,
            metadata,
            factory,
            interceptors: None,
            globals: None,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn interceptor_manager(&self) -> &Arc<dyn ContainerInterceptors> {
        &self.interceptors
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataProvider> {
        &self.metadata
    }

    pub fn factory(&self) -> &Arc<dyn HandlerFactory> {
        &self.factory
    }

    pub fn globals(&self) -> &Arc<InterceptorRegistry> {
        &self.globals
    }

    /// The named cache service, created as an in-memory LRU store on first use.
    pub fn cache_service(&self, name: &str) -> Arc<dyn CacheStore> {
        let capacity = NonZeroUsize::new(self.config.cache.capacity).unwrap_or(NonZeroUsize::MIN);
        let entry = self
            .cache_services
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCacheStore::new(capacity)));
        Arc::clone(entry.value())
    }

    /// Installs `store` as the cache service called `name`. Proxies built afterwards use it.
    pub fn install_cache_service(&self, name: impl Into<String>, store: Arc<dyn CacheStore>) {
        self.cache_services.insert(name.into(), store);
    }

    /// Starts building a proxy for `target` without registering it.
    pub fn proxy_builder(&self, target: &str) -> DispatchProxyBuilder<'_> {
        DispatchProxy::builder(target, self)
    }

    /// The shared proxy for `target`, created on first request.
    pub fn proxy(&self, target: &str) -> Result<Arc<DispatchProxy>, DispatchError> {
        let id = TargetId::parse(target)?;
        if let Some(proxy) = self.proxies.get(&id) {
            return Ok(Arc::clone(proxy.value()));
        }
        let proxy = DispatchProxy::builder(target, self).build()?;
        Ok(self.install_proxy(proxy))
    }

    /// Registers a proxy built through `proxy_builder`. An existing proxy for the same
    /// target wins and is returned instead.
    pub fn install_proxy(&self, proxy: DispatchProxy) -> Arc<DispatchProxy> {
        let entry = self
            .proxies
            .entry(proxy.target().clone())
            .or_insert_with(|| Arc::new(proxy));
        Arc::clone(entry.value())
    }

    /// Destroys every proxy and releases the container scope.
    pub fn destroy(&self) {
        let count = self.proxies.len();
        for entry in self.proxies.iter() {
            entry.value().destroy();
        }
        self.proxies.clear();
        self.interceptors.release();
        info!(app = %self.name, proxies = count, "application destroyed");
    }
}
