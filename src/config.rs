//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - `jfrpath.toml` (default configuration)
//! - `jfrpath.local.toml` (git-ignored local overrides)
//! - Environment variables (`JFRPATH_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # jfrpath.toml
//! [query]
//! default_limit = 1000
//! default_list_match = "any"
//!
//! [query.cancellation]
//! timeout_secs = 30
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! JFRPATH_QUERY__DEFAULT_LIMIT=500
//! JFRPATH_QUERY__CANCELLATION__TIMEOUT_SECS=10
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use jfrpath_ast::ListMatchMode;
use serde::{Deserialize, Serialize};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query-engine-wide defaults (C9 facade options, A2 resource guard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default `--limit` applied by the facade when a query doesn't specify
    /// one explicitly.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Ambient list-quantifier mode used when a predicate carries no
    /// explicit `any:`/`all:`/`none:` prefix.
    #[serde(default = "default_list_match", with = "list_match_mode_serde")]
    pub default_list_match: ListMatchMode,

    /// Cooperative cancellation settings.
    #[serde(default)]
    pub cancellation: CancellationConfig,

    /// Resource-limit settings.
    #[serde(default)]
    pub resource_limits: ResourceLimitsConfig,
}

/// Cooperative cancellation timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfig {
    /// Query timeout in seconds (0 = no timeout).
    #[serde(default)]
    pub timeout_secs: u64,
}

impl CancellationConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.timeout_secs))
        }
    }
}

impl Default for CancellationConfig {
    fn default() -> Self {
        CancellationConfig { timeout_secs: 0 }
    }
}

/// Resource-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimitsConfig {
    /// Maximum rows a single pipeline stage may retain (0 = unlimited).
    #[serde(default = "default_max_retained_rows")]
    pub max_retained_rows: usize,

    /// Maximum path segments a single query may navigate (0 = unlimited).
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        ResourceLimitsConfig {
            max_retained_rows: default_max_retained_rows(),
            max_path_depth: default_max_path_depth(),
        }
    }
}

impl From<&ResourceLimitsConfig> for crate::execution::ResourceLimits {
    fn from(cfg: &ResourceLimitsConfig) -> Self {
        crate::execution::ResourceLimits {
            max_retained_rows: (cfg.max_retained_rows != 0).then_some(cfg.max_retained_rows),
            max_path_depth: (cfg.max_path_depth != 0).then_some(cfg.max_path_depth),
        }
    }
}

/// Logging configuration, consumed by a host to set up `tracing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_limit() -> usize {
    1000
}
fn default_list_match() -> ListMatchMode {
    ListMatchMode::Any
}
fn default_max_retained_rows() -> usize {
    1_000_000
}
fn default_max_path_depth() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

mod list_match_mode_serde {
    use jfrpath_ast::ListMatchMode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &ListMatchMode, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match mode {
            ListMatchMode::Any => "any",
            ListMatchMode::All => "all",
            ListMatchMode::None => "none",
        };
        serializer.serialize_str(s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ListMatchMode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "any" => Ok(ListMatchMode::Any),
            "all" => Ok(ListMatchMode::All),
            "none" => Ok(ListMatchMode::None),
            other => Err(serde::de::Error::custom(format!(
                "invalid list match mode: {other}"
            ))),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. `jfrpath.toml` (base configuration)
    /// 2. `jfrpath.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`JFRPATH_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("jfrpath.toml"))
            .merge(Toml::file("jfrpath.local.toml"))
            .merge(Env::prefixed("JFRPATH_").split("__"))
            .join(Figment::from(Self::default_provider()))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("JFRPATH_").split("__"))
            .join(Figment::from(Self::default_provider()))
            .extract()
    }

    fn default_provider() -> impl figment::Provider {
        Serialized::defaults(Config::default())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            query: QueryConfig {
                default_limit: default_limit(),
                default_list_match: default_list_match(),
                cancellation: CancellationConfig::default(),
                resource_limits: ResourceLimitsConfig::default(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
