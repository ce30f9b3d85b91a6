//! # Configuration
//!
//! Hierarchical engine configuration, loaded from `lazygraph.toml` +
//! `lazygraph.local.toml` + `LAZYGRAPH_*` environment variables (SPEC_FULL.md
//! §2 "Config"). Nothing here is read by the resolver itself on the hot
//! path — [`ResolverConfig::cycle_guard_depth`] is threaded into a
//! [`crate::context::Context`] via [`crate::context::Context::from_config`],
//! and `logging` only controls how `tracing` is initialized by an embedder.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for a LazyGraph embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolver tuning knobs (spec.md §4.5, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Recursion-depth bound past which the cycle guard fires
    /// (spec.md §4.5: "recursion_depth ≥ 8"). Configurable so an
    /// embedder with legitimately deep schemas can raise it.
    #[serde(default = "default_cycle_guard_depth")]
    pub cycle_guard_depth: usize,
}

fn default_cycle_guard_depth() -> usize {
    8
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            cycle_guard_depth: default_cycle_guard_depth(),
        }
    }
}

/// Logging configuration. LazyGraph never initializes a subscriber itself
/// (spec.md §1: "Logging formatting... out of scope") — this struct only
/// tells an embedder what level/format to configure `tracing` with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations, merging in order:
    /// 1. `lazygraph.toml` (base configuration)
    /// 2. `lazygraph.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`LAZYGRAPH_` prefix, `__`-nested)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            EngineConfig::default(),
        ))
        .merge(Toml::file("lazygraph.toml"))
        .merge(Toml::file("lazygraph.local.toml"))
        .merge(Env::prefixed("LAZYGRAPH_").split("__"))
        .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            EngineConfig::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LAZYGRAPH_").split("__"))
        .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cycle_guard_depth_is_eight() {
        assert_eq!(EngineConfig::default().resolver.cycle_guard_depth, 8);
    }

    #[test]
    fn load_falls_back_to_defaults_when_no_files_present() {
        // No lazygraph.toml in the test working directory; this must not fail.
        let config = EngineConfig::load().expect("defaults alone must extract");
        assert_eq!(config.logging.level, "info");
    }
}
