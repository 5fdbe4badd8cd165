// src/core/dispatch/metadata.rs

//! Descriptions of controllers, their actions, and the interceptors they declare.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMetadata {
    pub controller: String,
    pub name: String,
}

impl ActionMetadata {
    /// The `controller.action` path, which is also the action's catalog key.
    pub fn path(&self) -> String {
        format!("{}.{}", self.controller, self.name)
    }
}

/// A reference to an interceptor by catalog name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorMetadata {
    pub name: String,
}

impl InterceptorMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A controller's actions plus the interceptors that apply to all of them.
#[derive(Debug, Clone, Default)]
pub struct ControllerMetadata {
    pub name: String,
    actions: HashMap<String, ActionMetadata>,
    pub before: Vec<InterceptorMetadata>,
    pub after: Vec<InterceptorMetadata>,
    pub exception: Vec<InterceptorMetadata>,
    pub finally: Vec<InterceptorMetadata>,
}

impl ControllerMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        let action = action.into();
        self.actions.insert(
            action.clone(),
            ActionMetadata {
                controller: self.name.clone(),
                name: action,
            },
        );
        self
    }

    pub fn with_before(mut self, name: impl Into<String>) -> Self {
        self.before.push(InterceptorMetadata::new(name));
        self
    }

    pub fn with_after(mut self, name: impl Into<String>) -> Self {
        self.after.push(InterceptorMetadata::new(name));
        self
    }

    pub fn with_exception(mut self, name: impl Into<String>) -> Self {
        self.exception.push(InterceptorMetadata::new(name));
        self
    }

    pub fn with_finally(mut self, name: impl Into<String>) -> Self {
        self.finally.push(InterceptorMetadata::new(name));
        self
    }

    pub fn action(&self, name: &str) -> Option<&ActionMetadata> {
        self.actions.get(name)
    }
}

/// Resolves controller metadata by controller name.
pub trait MetadataProvider: Send + Sync {
    fn controller(&self, name: &str) -> Option<Arc<ControllerMetadata>>;
}

/// A `MetadataProvider` over explicitly registered controllers.
#[derive(Debug, Default)]
pub struct StaticMetadata {
    controllers: DashMap<String, Arc<ControllerMetadata>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, controller: ControllerMetadata) {
        self.controllers
            .insert(controller.name.clone(), Arc::new(controller));
    }
}

impl MetadataProvider for StaticMetadata {
    fn controller(&self, name: &str) -> Option<Arc<ControllerMetadata>> {
        self.controllers.get(name).map(|c| Arc::clone(c.value()))
    }
}
