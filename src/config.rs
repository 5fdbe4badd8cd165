// src/config.rs

//! Manages application configuration: loading, defaults, and validation.

use crate::core::cache::CacheStrategy;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;

/// The runtime mode of an application.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Error outcomes expose their cause.
    Dev,
    #[default]
    Prod,
}

impl Mode {
    pub fn is_dev(&self) -> bool {
        matches!(self, Mode::Dev)
    }
}

/// How the Finally chain reacts to a failing handler.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FinallyMode {
    /// The first failure aborts every later handler and scope.
    #[default]
    Compat,
    /// Every handler in every scope is attempted; the first failure is reported afterwards.
    RunAll,
}

/// Settings applied to every dispatch proxy of an application.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DispatchConfig {
    /// The cache strategy proxies use unless built with another one.
    #[serde(default)]
    pub cache_strategy: CacheStrategy,
    #[serde(default)]
    pub finally_mode: FinallyMode,
}

/// Configuration of the cache service dispatch proxies consult.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// The cache service name proxies look up.
    #[serde(default = "default_cache_name")]
    pub name: String,
    /// Capacity of each in-memory cache service, in entries.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_name() -> String {
    "action_proxy".to_string()
}
fn default_cache_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            capacity: default_cache_capacity(),
        }
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_app_name")]
    app_name: String,
    #[serde(default)]
    mode: Mode,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    cache: CacheConfig,
}

fn default_app_name() -> String {
    "app".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Represents the final, validated application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app_name: String,
    pub mode: Mode,
    pub log_level: String,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            mode: Mode::default(),
            log_level: default_log_level(),
            dispatch: DispatchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        let config = Config {
            app_name: raw.app_name,
            mode: raw.mode,
            log_level: raw.log_level,
            dispatch: raw.dispatch,
            cache: raw.cache,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(anyhow!("app_name cannot be empty"));
        }
        if self.cache.name.trim().is_empty() {
            return Err(anyhow!("cache.name cannot be empty"));
        }
        if self.cache.capacity == 0 {
            return Err(anyhow!("cache.capacity cannot be 0"));
        }
        if self.log_level.trim().is_empty() {
            warn!("log_level is empty; falling back to the subscriber default");
        }
        Ok(())
    }
}
