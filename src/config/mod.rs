//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to expose interactive API docs (Swagger UI). Should be false in hardened production.
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_docs: true,
            request_timeout_seconds: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Workflow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global cap on concurrently running workflows.
    pub max_concurrent_workflows: usize,
    /// Default per-workflow scan fan-out when the request does not set one.
    pub default_max_concurrent_scans: usize,
    /// Default per-target scan timeout in seconds.
    pub default_target_timeout_seconds: u64,
    /// Default reconnaissance profile forwarded to the recon provider.
    pub default_recon_profile: String,
    /// Default scan types when the request does not set any.
    pub default_scan_types: Vec<String>,
    /// Fraction of failed/timed-out scans above which the scanning phase
    /// fails. Strictly compared: 1.0 disables the check entirely, so even a
    /// 100% failure rate is recorded as outcomes rather than a phase failure.
    pub failure_threshold: f64,
    /// Risk score above which a target is reported as high-risk.
    pub high_risk_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: 8,
            default_max_concurrent_scans: 5,
            default_target_timeout_seconds: 60,
            default_recon_profile: "standard".to_string(),
            default_scan_types: vec!["sqli".to_string(), "xss".to_string()],
            failure_threshold: 1.0,
            high_risk_threshold: 70,
        }
    }
}

/// Persistence backend selection
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// JSON documents on the local filesystem; survives restarts.
    #[default]
    File,
    /// In-process map; state is lost on restart.
    Memory,
}

/// Workflow store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            data_dir: PathBuf::from(".reconflow/workflows"),
        }
    }
}

/// External provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub recon_base_url: String,
    pub scan_base_url: String,
    /// Outer HTTP timeout for provider calls; reconnaissance may take minutes.
    pub request_timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            recon_base_url: "http://localhost:8081".to_string(),
            scan_base_url: "http://localhost:8082".to_string(),
            request_timeout_seconds: 900,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Startup validation of loaded configuration
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Error raised when configuration values are inconsistent.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ValidationError(pub String);

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.server.host.is_empty() {
            return Err(ValidationError("server.host must not be empty".into()));
        }
        if self.engine.max_concurrent_workflows < 1 {
            return Err(ValidationError(
                "engine.max_concurrent_workflows must be at least 1".into(),
            ));
        }
        if self.engine.default_max_concurrent_scans < 1 {
            return Err(ValidationError(
                "engine.default_max_concurrent_scans must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.engine.failure_threshold) {
            return Err(ValidationError(
                "engine.failure_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.store.backend == StoreBackend::File && self.store.data_dir.as_os_str().is_empty() {
            return Err(ValidationError(
                "store.data_dir must be set for the file backend".into(),
            ));
        }
        if self.providers.recon_base_url.is_empty() || self.providers.scan_base_url.is_empty() {
            return Err(ValidationError(
                "providers.recon_base_url and providers.scan_base_url must be set".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RECONFLOW").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
