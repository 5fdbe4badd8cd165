// src/core/errors.rs

//! Defines the primary error type for the dispatch core and the control-flow `Signal`.

use crate::core::handler::HandlerKind;
use crate::core::outcome::Outcome;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the dispatch pipeline.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A malformed `controller.action` identifier. Fatal at proxy construction.
    #[error("Invalid controller action: {0}")]
    InvalidTarget(String),

    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    #[error("Action '{action}' not found on controller '{controller}'")]
    ActionNotFound { controller: String, action: String },

    #[error("No {kind} handler registered under '{name}'")]
    HandlerNotFound { kind: HandlerKind, name: String },

    /// A failure raised by an action or interceptor body.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Dispatch proxy '{0}' has been destroyed")]
    Destroyed(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

// `std::io::Error` is not cloneable, so the `Io` arm shares it through an Arc.
impl Clone for DispatchError {
    fn clone(&self) -> Self {
        match self {
            DispatchError::Io(e) => DispatchError::Io(Arc::clone(e)),
            DispatchError::InvalidTarget(s) => DispatchError::InvalidTarget(s.clone()),
            DispatchError::ControllerNotFound(s) => DispatchError::ControllerNotFound(s.clone()),
            DispatchError::ActionNotFound { controller, action } => DispatchError::ActionNotFound {
                controller: controller.clone(),
                action: action.clone(),
            },
            DispatchError::HandlerNotFound { kind, name } => DispatchError::HandlerNotFound {
                kind: *kind,
                name: name.clone(),
            },
            DispatchError::Handler(s) => DispatchError::Handler(s.clone()),
            DispatchError::Render(s) => DispatchError::Render(s.clone()),
            DispatchError::Panicked(s) => DispatchError::Panicked(s.clone()),
            DispatchError::Destroyed(s) => DispatchError::Destroyed(s.clone()),
            DispatchError::Internal(s) => DispatchError::Internal(s.clone()),
        }
    }
}

impl PartialEq for DispatchError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DispatchError::Io(e1), DispatchError::Io(e2)) => e1.to_string() == e2.to_string(),
            (DispatchError::InvalidTarget(s1), DispatchError::InvalidTarget(s2)) => s1 == s2,
            (DispatchError::ControllerNotFound(s1), DispatchError::ControllerNotFound(s2)) => {
                s1 == s2
            }
            (
                DispatchError::ActionNotFound {
                    controller: c1,
                    action: a1,
                },
                DispatchError::ActionNotFound {
                    controller: c2,
                    action: a2,
                },
            ) => c1 == c2 && a1 == a2,
            (
                DispatchError::HandlerNotFound { kind: k1, name: n1 },
                DispatchError::HandlerNotFound { kind: k2, name: n2 },
            ) => k1 == k2 && n1 == n2,
            (DispatchError::Handler(s1), DispatchError::Handler(s2)) => s1 == s2,
            (DispatchError::Render(s1), DispatchError::Render(s2)) => s1 == s2,
            (DispatchError::Panicked(s1), DispatchError::Panicked(s2)) => s1 == s2,
            (DispatchError::Destroyed(s1), DispatchError::Destroyed(s2)) => s1 == s2,
            (DispatchError::Internal(s1), DispatchError::Internal(s2)) => s1 == s2,
            _ => false,
        }
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        DispatchError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Render(format!("JSON serialization error: {e}"))
    }
}

/// The non-normal exit of a handler.
///
/// An `Outcome` raised through `Signal::Outcome` is a shortcut, not a failure: every chain
/// treats it exactly like a normally returned `Some(outcome)`.
#[derive(Debug, Clone)]
pub enum Signal {
    Outcome(Outcome),
    Error(DispatchError),
}

impl Signal {
    /// Raises `outcome` as a shortcut out of the current handler.
    pub fn halt(outcome: Outcome) -> Self {
        Signal::Outcome(outcome)
    }
}

impl From<DispatchError> for Signal {
    fn from(e: DispatchError) -> Self {
        Signal::Error(e)
    }
}

impl From<Outcome> for Signal {
    fn from(o: Outcome) -> Self {
        Signal::Outcome(o)
    }
}

/// The return type of every action and result-producing interceptor.
/// `Ok(None)` means "no explicit outcome".
pub type HandlerResult = Result<Option<Outcome>, Signal>;

/// Folds a handler result into the outcome it decided, surfacing only real failures.
pub fn settle(result: HandlerResult) -> Result<Option<Outcome>, DispatchError> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(Signal::Outcome(outcome)) => Ok(Some(outcome)),
        Err(Signal::Error(e)) => Err(e),
    }
}
