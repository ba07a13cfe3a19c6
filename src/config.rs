//! Configuration loading and types for lfsgate.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, the metadata API, the object store, and logging.
//! The value is built once at startup and handed to component
//! constructors; nothing mutates it afterwards.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata API settings.
    #[serde(default)]
    pub meta: MetaConfig,

    /// S3 object store settings.
    #[serde(default)]
    pub s3: S3Config,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL used in download/verify links
    /// (e.g. `https://lfs.example.com`). When empty, links are built from
    /// the request's `Host` header.
    #[serde(default)]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
        }
    }
}

/// Authoritative metadata API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaConfig {
    /// Base URL of the metadata API (e.g. `https://api.example.com`).
    #[serde(default = "default_meta_endpoint")]
    pub endpoint: String,

    /// Media type sent in `Accept` and served to LFS clients.
    #[serde(default = "default_media_type")]
    pub media_type: String,

    /// Shared secret for `Content-Hmac` request signing. Empty disables it.
    #[serde(default)]
    pub hmac_key: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_meta_endpoint(),
            media_type: default_media_type(),
            hmac_key: String::new(),
        }
    }
}

/// S3 object store configuration.
///
/// Field names match `lfsgate.example.yaml`: `s3.access_key` and
/// `s3.secret_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding object content.
    #[serde(default)]
    pub bucket: String,

    /// AWS region used in the credential scope.
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key (also accepts `access_key_id`).
    #[serde(alias = "access_key_id", default)]
    pub access_key: String,

    /// Secret key (also accepts `secret_access_key`).
    #[serde(alias = "secret_access_key", default)]
    pub secret_key: String,

    /// Custom S3-compatible endpoint (e.g. MinIO). Empty means AWS.
    #[serde(default)]
    pub endpoint: String,

    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
            endpoint: String::new(),
            use_path_style: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_meta_endpoint() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_media_type() -> String {
    "application/vnd.git-lfs+json".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
