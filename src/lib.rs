// src/lib.rs

pub mod config;
pub mod core;

// Re-export
pub use crate::core::dispatch::{App, DispatchProxy};
pub use crate::core::handler::registry::{register_global_interceptor, release_global_resources};
