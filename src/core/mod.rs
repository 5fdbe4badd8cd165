// src/core/mod.rs

//! The central module containing the dispatch pipeline and the types it moves around.

pub mod cache;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod handler;
pub mod metrics;
pub mod outcome;

pub use context::ActionContext;
pub use errors::{DispatchError, HandlerResult, Signal};
pub use outcome::Outcome;
