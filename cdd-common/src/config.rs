//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from a TOML file. The file path is resolved
//! in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CDD_CONFIG`)
//! 3. Platform config directory (`<config_dir>/cdd/cdd-service.toml`)
//!
//! A missing file is not an error: compiled defaults are used and a warning
//! is logged. Secrets can be supplied through environment variables instead
//! of the TOML file (see [`ServiceConfig::apply_env_overrides`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CDD_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub overrides: OverridesConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Which metadata source implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// TopBraid knowledge system queried with SPARQL
    #[default]
    Sparql,
    /// Local JSON dictionary file
    File,
}

/// Metadata source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// SPARQL endpoint URL
    #[serde(default)]
    pub service_url: String,

    /// Session login URL (empty disables session handling)
    #[serde(default)]
    pub login_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Ontology namespace of the dictionary properties
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Named graph holding the dictionary
    #[serde(default = "default_graph_id")]
    pub graph_id: String,

    /// Timeout applied to every outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Dictionary file for `kind = "file"`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Refreshable cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which the cache is considered stale
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Consecutive fetch failures tolerated before the cache is invalidated
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How often the scheduler checks the cache
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Directory of the persistent backup store (disabled when absent)
    #[serde(default)]
    pub persistent_dir: Option<PathBuf>,
}

/// Override policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridesConfig {
    /// Policies whose non-overridden attributes get priority "0"
    #[serde(default = "default_reset_priority_policies")]
    pub reset_priority_policies: Vec<String>,
}

/// Out-of-band alerting configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Webhook receiving `{"text": ...}` messages (Slack compatible)
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_namespace_prefix() -> String {
    "http://data.mskcc.org/ontologies/ClinicalDataDictionary#".to_string()
}

fn default_graph_id() -> String {
    "urn:x-evn-master:cdd".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_age_hours() -> u64 {
    72
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_reset_priority_policies() -> Vec<String> {
    vec!["mskimpact".to_string()]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            overrides: OverridesConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            service_url: String::new(),
            login_url: String::new(),
            username: String::new(),
            password: String::new(),
            namespace_prefix: default_namespace_prefix(),
            graph_id: default_graph_id(),
            request_timeout_secs: default_request_timeout_secs(),
            path: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
            failure_threshold: default_failure_threshold(),
            refresh_interval_secs: default_refresh_interval_secs(),
            persistent_dir: None,
        }
    }
}

impl Default for OverridesConfig {
    fn default() -> Self {
        Self {
            reset_priority_policies: default_reset_priority_policies(),
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 60 * 60)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from `path`, falling back to defaults if the file is missing
    ///
    /// A file that exists but cannot be parsed is an error: silently ignoring
    /// a broken config would start the service against the wrong source.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply secret overrides from environment variables
    ///
    /// `CDD_SOURCE_USERNAME`, `CDD_SOURCE_PASSWORD` and `CDD_ALERT_WEBHOOK_URL`
    /// take precedence over the TOML values when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(username) = non_empty_env("CDD_SOURCE_USERNAME") {
            self.source.username = username;
        }
        if let Some(password) = non_empty_env("CDD_SOURCE_PASSWORD") {
            self.source.password = password;
        }
        if let Some(webhook) = non_empty_env("CDD_ALERT_WEBHOOK_URL") {
            self.alerts.webhook_url = Some(webhook);
        }
    }

    /// Check the settings the selected source needs
    pub fn validate(&self) -> Result<()> {
        match self.source.kind {
            SourceKind::Sparql if self.source.service_url.trim().is_empty() => Err(Error::Config(
                "source.service_url is required when source.kind = \"sparql\"".to_string(),
            )),
            SourceKind::File if self.source.path.is_none() => Err(Error::Config(
                "source.path is required when source.kind = \"file\"".to_string(),
            )),
            _ if self.cache.failure_threshold == 0 => Err(Error::Config(
                "cache.failure_threshold must be at least 1".to_string(),
            )),
            _ if self.cache.refresh_interval_secs == 0 => Err(Error::Config(
                "cache.refresh_interval_secs must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the config file path
///
/// Priority: command-line argument, then `CDD_CONFIG`, then the platform
/// config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    // Priority 3: OS-dependent config directory
    default_config_path()
}

/// Default config file location for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("cdd").join("cdd-service.toml"))
        .unwrap_or_else(|| PathBuf::from("cdd-service.toml"))
}
