// src/core/context.rs

//! Per-request state threaded through the dispatch pipeline.
//!
//! An `ActionContext` is owned by exactly one in-flight request and is never shared across
//! tasks, so none of its state is synchronized.

use crate::core::errors::DispatchError;
use crate::core::outcome::{DefaultRenderer, Outcome, Renderer};
use bytes::Bytes;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// The inbound half of a request, as far as dispatch needs it.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub query: String,
    pub accept: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The outbound half. Rendering overwrites it wholesale.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    writes: u32,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            headers: HashMap::new(),
            body: Bytes::new(),
            writes: 0,
        }
    }
}

impl Response {
    pub fn write(&mut self, status: u16, content_type: &str, body: Bytes) {
        self.status = status;
        self.content_type = Some(content_type.to_string());
        self.body = body;
        self.writes += 1;
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// How many times a body has been written.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct ActionContext {
    request: Request,
    response: Response,
    session: Option<Session>,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    action_path: Option<String>,
    cached_template: Option<String>,
    renderer: Arc<dyn Renderer>,
    dissolve_calls: u32,
    destroy_calls: u32,
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("session", &self.session)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("action_path", &self.action_path)
            .field("cached_template", &self.cached_template)
            .finish()
    }
}

impl ActionContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::default(),
            session: None,
            attributes: HashMap::new(),
            action_path: None,
            cached_template: None,
            renderer: Arc::new(DefaultRenderer),
            dissolve_calls: 0,
            destroy_calls: 0,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn req(&self) -> &Request {
        &self.request
    }

    pub fn resp(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn set_attribute<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.insert(key.into(), Box::new(value));
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    /// Records the canonical `controller.action` path of the dispatch target.
    pub fn set_action_path(&mut self, path: impl Into<String>) {
        self.action_path = Some(path.into());
    }

    pub fn action_path(&self) -> Option<&str> {
        self.action_path.as_deref()
    }

    /// Remembers (or, with `None`, forgets) the template resolved for this request.
    pub fn cache_template(&mut self, template: Option<String>) {
        self.cached_template = template;
    }

    pub fn cached_template(&self) -> Option<&str> {
        self.cached_template.as_deref()
    }

    /// Detaches request-scoped state ahead of rendering: the session is written out as a
    /// cookie. Only the first call has an effect.
    pub fn dissolve(&mut self) {
        self.dissolve_calls += 1;
        if self.dissolve_calls > 1 {
            return;
        }
        if let Some(session) = &self.session {
            let cookie = format!("session={}", session.id);
            self.response.set_header("Set-Cookie", cookie);
        }
        trace!("context dissolved");
    }

    /// Tears the request state down once the outcome has been rendered.
    pub fn destroy(&mut self) {
        self.destroy_calls += 1;
        if self.destroy_calls > 1 {
            return;
        }
        self.attributes.clear();
        self.cached_template = None;
        trace!("context destroyed");
    }

    pub fn dissolve_calls(&self) -> u32 {
        self.dissolve_calls
    }

    pub fn destroy_calls(&self) -> u32 {
        self.destroy_calls
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy_calls > 0
    }

    /// Renders `outcome` through this context's renderer.
    pub fn render(&mut self, outcome: &Outcome) -> Result<(), DispatchError> {
        let renderer = Arc::clone(&self.renderer);
        renderer.render(outcome, self)
    }
}
