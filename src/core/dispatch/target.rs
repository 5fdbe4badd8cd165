// src/core/dispatch/target.rs

//! Parsing of `controller.action` dispatch targets.

use crate::core::errors::DispatchError;
use std::fmt;
use std::str::FromStr;

/// A validated `(controller, action)` pair.
///
/// The separator is the last `.`, so controllers may themselves be dotted paths
/// (`shop.admin.Orders.list` is controller `shop.admin.Orders`, action `list`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    controller: String,
    action: String,
}

impl TargetId {
    pub fn parse(target: &str) -> Result<Self, DispatchError> {
        let invalid = || DispatchError::InvalidTarget(target.to_string());
        let (controller, action) = target.rsplit_once('.').ok_or_else(invalid)?;
        if controller.is_empty() || action.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            controller: controller.to_string(),
            action: action.to_string(),
        })
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl FromStr for TargetId {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.controller, self.action)
    }
}
