// src/core/handler/chain.rs

//! Applies one scope's handler list against a request, with the short-circuit or fold rule of
//! each interceptor kind.
//!
//! Before and Exception chains stop at the first handler that decides an outcome. The After
//! chain is a fold: every handler runs and feeds the next. The Finally chain runs handlers in
//! order and, in `FinallyMode::Compat`, stops at the first failure.

use super::{AfterInterceptor, BeforeInterceptor, ExceptionInterceptor, FinallyInterceptor};
use crate::config::FinallyMode;
use crate::core::context::ActionContext;
use crate::core::errors::{DispatchError, Signal, settle};
use crate::core::outcome::Outcome;
use std::sync::Arc;
use tracing::{debug, error};

/// Runs Before handlers until one produces an outcome.
pub async fn run_before(
    handlers: &[Arc<dyn BeforeInterceptor>],
    ctx: &mut ActionContext,
) -> Result<Option<Outcome>, DispatchError> {
    for handler in handlers {
        if let Some(outcome) = settle(handler.before(ctx).await)? {
            debug!(interceptor = handler.name(), "before interceptor decided the outcome");
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

/// Folds `outcome` through every After handler in order.
pub async fn run_after(
    handlers: &[Arc<dyn AfterInterceptor>],
    mut outcome: Option<Outcome>,
    ctx: &mut ActionContext,
) -> Result<Option<Outcome>, DispatchError> {
    for handler in handlers {
        outcome = settle(handler.after(outcome, ctx).await)?;
    }
    Ok(outcome)
}

/// Offers `err` to each Exception handler until one recovers it.
///
/// A handler that fails while handling is logged and skipped; the next one is offered the
/// original error.
pub async fn run_exception(
    handlers: &[Arc<dyn ExceptionInterceptor>],
    err: &DispatchError,
    ctx: &mut ActionContext,
) -> Option<Outcome> {
    for handler in handlers {
        match settle(handler.on_exception(err, ctx).await) {
            Ok(Some(outcome)) => {
                debug!(interceptor = handler.name(), "exception recovered");
                return Some(outcome);
            }
            Ok(None) => {}
            Err(e) => {
                error!(interceptor = handler.name(), "exception interceptor failed: {}", e);
            }
        }
    }
    None
}

/// Runs every Finally handler. An outcome raised here is ignored: the response has already
/// been rendered.
pub async fn run_finally(
    handlers: &[Arc<dyn FinallyInterceptor>],
    ctx: &mut ActionContext,
    mode: FinallyMode,
) -> Result<(), DispatchError> {
    let mut first_failure = None;
    for handler in handlers {
        match handler.finally(ctx).await {
            Ok(()) => {}
            Err(Signal::Outcome(_)) => {
                debug!(interceptor = handler.name(), "ignoring outcome raised from finally");
            }
            Err(Signal::Error(e)) => match mode {
                FinallyMode::Compat => return Err(e),
                FinallyMode::RunAll => {
                    error!(interceptor = handler.name(), "finally interceptor failed: {}", e);
                    first_failure.get_or_insert(e);
                }
            },
        }
    }
    first_failure.map_or(Ok(()), Err)
}
