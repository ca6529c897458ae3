//! Configuration management for SurfaceMap components

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use surfacemap_core::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scan engine control API settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Session settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Subdomain probing settings
    #[serde(default)]
    pub subdomains: SubdomainConfig,

    /// Structure consolidation settings
    #[serde(default)]
    pub structure: StructureConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (SURFACEMAP_ prefix)
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Engine settings
        if let Some(val) = var("SURFACEMAP_ENGINE_URL") {
            self.engine.base_url = val;
        }
        if let Some(val) = var("SURFACEMAP_ENGINE_API_KEY") {
            self.engine.api_key = Some(val);
        }

        // Scan settings
        if let Some(val) = var("SURFACEMAP_OUTPUT_DIR") {
            self.scan.output_dir = val;
        }
        if let Some(n) = var("SURFACEMAP_PAGE_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.scan.page_concurrency = n;
        }
        if let Some(n) = var("SURFACEMAP_MAX_POLLS").and_then(|v| v.parse().ok()) {
            self.scan.max_polls = Some(n);
        }
        if let Some(n) = var("SURFACEMAP_MAX_POLL_SECONDS").and_then(|v| v.parse().ok()) {
            self.scan.max_poll_seconds = Some(n);
        }

        // Logging
        if let Some(val) = var("SURFACEMAP_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("SURFACEMAP_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }

    /// Reject values that would make a session hang or never start
    pub fn validate(&self) -> Result<()> {
        if self.scan.poll_interval_seconds == 0 {
            return Err(Error::Configuration(
                "scan.poll_interval_seconds must be at least 1".into(),
            ));
        }
        if self.scan.page_concurrency == 0 {
            return Err(Error::Configuration(
                "scan.page_concurrency must be at least 1".into(),
            ));
        }
        if self.engine.base_url.trim().is_empty() {
            return Err(Error::Configuration("engine.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Scan engine control API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine's API
    #[serde(default = "default_engine_url")]
    pub base_url: String,

    /// API key sent with every request
    pub api_key: Option<String>,

    /// Name of the context created for each session
    #[serde(default = "default_context_name")]
    pub context_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_engine_url() -> String {
    String::from("http://127.0.0.1:8080")
}

fn default_context_name() -> String {
    String::from("scan_context")
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_engine_url(),
            api_key: None,
            context_name: default_context_name(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory receiving artifacts and scan.log
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Client identifier sent with every request to the target
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout of the validation request in seconds
    #[serde(default = "default_validate_timeout")]
    pub validate_timeout_seconds: u64,

    /// Timeout of each page fetch in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout_seconds: u64,

    /// Maximum concurrent page fetches during form extraction
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,

    /// Seconds between two status polls of a remote job
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Give up on a remote job after this many polls
    #[serde(default)]
    pub max_polls: Option<u32>,

    /// Give up on a remote job after this many seconds
    #[serde(default = "default_max_poll_seconds")]
    pub max_poll_seconds: Option<u64>,

    /// Consecutive failed status queries tolerated before giving up
    #[serde(default = "default_max_poll_errors")]
    pub max_consecutive_poll_errors: u32,
}

fn default_output_dir() -> String {
    String::from("scan_results")
}

fn default_user_agent() -> String {
    format!("SurfaceMap/{} (Security Scanner)", env!("CARGO_PKG_VERSION"))
}

fn default_validate_timeout() -> u64 {
    10
}

fn default_page_timeout() -> u64 {
    5
}

fn default_page_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_poll_seconds() -> Option<u64> {
    Some(3600)
}

fn default_max_poll_errors() -> u32 {
    3
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            validate_timeout_seconds: default_validate_timeout(),
            page_timeout_seconds: default_page_timeout(),
            page_concurrency: default_page_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            max_polls: None,
            max_poll_seconds: default_max_poll_seconds(),
            max_consecutive_poll_errors: default_max_poll_errors(),
        }
    }
}

/// Subdomain probing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainConfig {
    /// Prefixes joined with the target host to form candidates
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Timeout per probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,

    /// Fail the phase on network errors instead of treating them as absence
    #[serde(default)]
    pub strict: bool,
}

fn default_prefixes() -> Vec<String> {
    ["www", "admin", "api", "dev", "test", "staging"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for SubdomainConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            timeout_seconds: default_probe_timeout(),
            strict: false,
        }
    }
}

/// Structure consolidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Run consolidation at the end of every scan
    #[serde(default = "default_true")]
    pub consolidate_after_scan: bool,

    /// Snapshot structure.json before rewriting it
    #[serde(default)]
    pub backup: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            consolidate_after_scan: true,
            backup: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log file path; defaults to scan.log in the output directory
    pub file: Option<String>,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn engine_url(mut self, url: impl Into<String>) -> Self {
        self.config.engine.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.engine.api_key = Some(key.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.scan.output_dir = dir.into();
        self
    }

    pub fn poll_interval_seconds(mut self, secs: u64) -> Self {
        self.config.scan.poll_interval_seconds = secs;
        self
    }

    pub fn max_polls(mut self, polls: u32) -> Self {
        self.config.scan.max_polls = Some(polls);
        self
    }

    pub fn subdomain_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.subdomains.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn backup(mut self, backup: bool) -> Self {
        self.config.structure.backup = backup;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
