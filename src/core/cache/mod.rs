// src/core/cache/mod.rs

//! Read-side response caching consulted before the dispatch pipeline runs.
//!
//! A `CacheStrategy` decides whether a request is looked up and under which key. Stores are
//! only ever read here; populating them is left to whoever renders and decides to cache.

pub mod memory;

pub use memory::MemoryCacheStore;

use crate::core::context::ActionContext;
use crate::core::metrics;
use crate::core::outcome::Outcome;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Prefix of every URL cache key.
pub const CACHE_KEY_PREFIX: &str = "urlcache:";

/// A key-value cache of rendered outcomes.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Outcome>;
}

/// How a dispatch proxy consults its cache.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CacheStrategy {
    #[default]
    NoCache,
    /// Keyed per session; requests without a session are not cached.
    SessionScoped,
    /// One entry per URL, shared by every caller.
    GlobalScoped,
}

impl CacheStrategy {
    /// The lookup key for this request, or `None` when no lookup should happen.
    pub fn cache_key(&self, ctx: &ActionContext) -> Option<String> {
        match self {
            CacheStrategy::NoCache => None,
            CacheStrategy::SessionScoped => ctx
                .session()
                .map(|session| url_cache_key(ctx, &session.id)),
            CacheStrategy::GlobalScoped => Some(url_cache_key(ctx, "")),
        }
    }

    /// Returns a previously stored outcome for this request, if any. Never writes the store.
    pub fn cached(&self, ctx: &ActionContext, store: &dyn CacheStore) -> Option<Outcome> {
        let key = self.cache_key(ctx)?;
        let hit = store.get(&key);
        let counter = if hit.is_some() {
            &*metrics::CACHE_HITS_TOTAL
        } else {
            &*metrics::CACHE_MISSES_TOTAL
        };
        counter.with_label_values(&[self.as_ref()]).inc();
        hit
    }
}

fn url_cache_key(ctx: &ActionContext, seed: &str) -> String {
    let req = ctx.req();
    let mut key = String::with_capacity(
        CACHE_KEY_PREFIX.len() + seed.len() + req.url.len() + req.query.len() + req.accept.len(),
    );
    key.push_str(CACHE_KEY_PREFIX);
    key.push_str(seed);
    key.push_str(&req.url);
    key.push_str(&req.query);
    key.push_str(&req.accept);
    key
}
