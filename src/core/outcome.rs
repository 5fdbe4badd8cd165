// src/core/outcome.rs

//! The values a dispatch produces for rendering, and the seam through which they are rendered.

use crate::core::context::ActionContext;
use crate::core::errors::DispatchError;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// The decided result of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No explicit result. Rendering it leaves the response untouched.
    NoResult,
    /// A finished body written straight to the response.
    Payload(Payload),
    /// A view rendered through the template path, defaulting to the recorded action path.
    Template(TemplateOutcome),
    /// A `302 Found` pointing at `location`.
    Redirect(String),
    /// A synthesized internal error.
    Error(ErrorOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl Payload {
    /// The body as UTF-8, lossily.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOutcome {
    /// Explicit view path. `None` resolves from the context's action path.
    pub path: Option<String>,
    pub args: serde_json::Value,
}

/// An internal-error outcome carrying its cause and the owning application.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorOutcome {
    pub status: u16,
    pub cause: Arc<DispatchError>,
    pub app: Arc<str>,
    /// Whether the rendered body may expose the cause (development mode).
    pub detailed: bool,
}

impl Outcome {
    pub fn text(body: impl Into<String>) -> Self {
        Self::text_with_status(200, body)
    }

    pub fn text_with_status(status: u16, body: impl Into<String>) -> Self {
        Outcome::Payload(Payload {
            status,
            content_type: CONTENT_TYPE_TEXT.to_string(),
            body: Bytes::from(body.into()),
        })
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        let body = serde_json::to_vec(value)?;
        Ok(Outcome::Payload(Payload {
            status: 200,
            content_type: CONTENT_TYPE_JSON.to_string(),
            body: Bytes::from(body),
        }))
    }

    /// A template at the default view path of the current action.
    pub fn template(args: serde_json::Value) -> Self {
        Outcome::Template(TemplateOutcome { path: None, args })
    }

    pub fn template_at(path: impl Into<String>, args: serde_json::Value) -> Self {
        Outcome::Template(TemplateOutcome {
            path: Some(path.into()),
            args,
        })
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Outcome::Redirect(location.into())
    }

    pub fn server_error(cause: DispatchError, app: Arc<str>, detailed: bool) -> Self {
        Outcome::Error(ErrorOutcome {
            status: 500,
            cause: Arc::new(cause),
            app,
            detailed,
        })
    }

    /// The HTTP status this outcome renders with.
    pub fn status(&self) -> u16 {
        match self {
            Outcome::NoResult => 200,
            Outcome::Payload(p) => p.status,
            Outcome::Template(_) => 200,
            Outcome::Redirect(_) => 302,
            Outcome::Error(e) => e.status,
        }
    }

    /// The body of a `Payload`, if this is one.
    pub fn payload_text(&self) -> Option<String> {
        match self {
            Outcome::Payload(p) => Some(p.body_str()),
            _ => None,
        }
    }
}

/// The rendering subsystem: turns an `Outcome` into response state.
pub trait Renderer: Send + Sync {
    fn render(&self, outcome: &Outcome, ctx: &mut ActionContext) -> Result<(), DispatchError>;
}

/// Maps an action path such as `shop.Orders.list` to its default view `shop/Orders/list`.
pub fn default_view_path(action_path: &str) -> String {
    action_path.replace('.', "/")
}

/// Writes payloads verbatim and renders templates as a JSON envelope of the view path and
/// its arguments. Real view engines plug in through `Renderer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

impl Renderer for DefaultRenderer {
    fn render(&self, outcome: &Outcome, ctx: &mut ActionContext) -> Result<(), DispatchError> {
        match outcome {
            Outcome::NoResult => Ok(()),
            Outcome::Payload(p) => {
                ctx.response_mut()
                    .write(p.status, &p.content_type, p.body.clone());
                Ok(())
            }
            Outcome::Template(t) => {
                let path = match (&t.path, ctx.action_path()) {
                    (Some(path), _) => path.clone(),
                    (None, Some(action_path)) => default_view_path(action_path),
                    (None, None) => {
                        return Err(DispatchError::Render(
                            "cannot resolve a default view without an action path".into(),
                        ));
                    }
                };
                ctx.cache_template(Some(path.clone()));
                let body = serde_json::to_vec(&serde_json::json!({
                    "template": path,
                    "args": t.args,
                }))?;
                ctx.response_mut()
                    .write(200, CONTENT_TYPE_JSON, Bytes::from(body));
                Ok(())
            }
            Outcome::Redirect(location) => {
                let resp = ctx.response_mut();
                resp.set_header("Location", location);
                resp.write(302, CONTENT_TYPE_TEXT, Bytes::new());
                Ok(())
            }
            Outcome::Error(e) => {
                let body = if e.detailed {
                    format!("{}: {}", e.app, e.cause)
                } else {
                    "Internal Server Error".to_string()
                };
                ctx.response_mut()
                    .write(e.status, CONTENT_TYPE_TEXT, Bytes::from(body));
                Ok(())
            }
        }
    }
}
