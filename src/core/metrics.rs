// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the dispatch pipeline.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_histogram,
};

lazy_static! {
    // --- Dispatch Counters ---
    /// The total number of requests that entered `DispatchProxy::handle`.
    pub static ref DISPATCH_TOTAL: Counter =
        register_counter!("actproxy_dispatch_total", "Total number of dispatched requests.").unwrap();
    /// Failures caught by the pipeline, labeled by the stage that raised them.
    pub static ref DISPATCH_ERRORS_TOTAL: CounterVec =
        register_counter_vec!("actproxy_dispatch_errors_total", "Total number of dispatch failures, labeled by stage.", &["stage"]).unwrap();
    /// The number of handler chains built.
    pub static ref MATERIALIZATIONS_TOTAL: Counter =
        register_counter!("actproxy_materializations_total", "Total number of dispatch proxies materialized.").unwrap();


    // --- Cache Counters ---
    /// Successful cache lookups, labeled by cache strategy.
    pub static ref CACHE_HITS_TOTAL: CounterVec =
        register_counter_vec!("actproxy_cache_hits_total", "Total number of cache hits, labeled by strategy.", &["strategy"]).unwrap();
    /// Failed cache lookups, labeled by cache strategy.
    pub static ref CACHE_MISSES_TOTAL: CounterVec =
        register_counter_vec!("actproxy_cache_misses_total", "Total number of cache misses, labeled by strategy.", &["strategy"]).unwrap();


    // --- Histograms ---
    /// Wall time of a full dispatch, render included.
    pub static ref DISPATCH_LATENCY_SECONDS: Histogram =
        register_histogram!("actproxy_dispatch_latency_seconds", "Latency of request dispatch in seconds.").unwrap();
}

/// Labels for `DISPATCH_ERRORS_TOTAL`.
pub mod stage {
    pub const ACTION: &str = "action";
    pub const RENDER: &str = "render";
    pub const ERROR_RENDER: &str = "error_render";
    pub const FINALLY: &str = "finally";
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
