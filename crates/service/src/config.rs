use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use storage::StorageConfig;

use crate::executor::DEFAULT_DOWNLOAD_TTL;

pub const DEFAULT_LISTEN_PORT: u16 = 3000;

pub struct Config {
    // http server configuration
    /// address for the API and relay server to listen on
    pub listen_addr: SocketAddr,
    /// base URL of the console, used to build share links.
    ///  if not set then only the raw token is returned
    pub public_url: Option<Url>,

    // envelope configuration
    /// secret the envelope key is derived from.
    ///  if not set the development placeholder is used,
    ///  which only starts with `allow_dev_secret`
    pub secret: Option<String>,
    /// accept the development placeholder secret
    pub allow_dev_secret: bool,

    // storage configuration
    /// which backend buckets are opened against
    pub storage: StorageConfig,
    /// endpoint that overrides whatever the operator submits
    pub s3_endpoint: Option<String>,
    /// region that overrides whatever the operator submits
    pub s3_region: Option<String>,

    // relay configuration
    /// storage endpoints the download relay may reach. when empty,
    ///  only `s3_endpoint` is allowed if set, otherwise any endpoint
    pub relay_allowed_endpoints: Vec<String>,
    /// lifetime of the signed URL behind a download reference
    pub download_ttl: Duration,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("public_url", &self.public_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("allow_dev_secret", &self.allow_dev_secret)
            .field("storage", &self.storage)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_region", &self.s3_region)
            .field("relay_allowed_endpoints", &self.relay_allowed_endpoints)
            .field("download_ttl", &self.download_ttl)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), DEFAULT_LISTEN_PORT),
            public_url: None,
            secret: None,
            allow_dev_secret: false,
            storage: StorageConfig::default(),
            s3_endpoint: None,
            s3_region: None,
            relay_allowed_endpoints: Vec::new(),
            download_ttl: DEFAULT_DOWNLOAD_TTL,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}

/// On-disk configuration, every field optional.
///
/// ```toml
/// listen_addr = "0.0.0.0:3000"
/// public_url = "https://console.example.com"
/// s3_endpoint = "http://garage:3900"
/// download_ttl_secs = 3600
/// log_level = "debug"
///
/// [storage]
/// type = "s3"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub listen_addr: Option<SocketAddr>,
    pub public_url: Option<Url>,
    pub secret: Option<String>,
    pub allow_dev_secret: Option<bool>,
    pub storage: Option<StorageConfig>,
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub relay_allowed_endpoints: Option<Vec<String>>,
    pub download_ttl_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Overlay every field that is set onto `config`.
    pub fn apply(self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(url) = self.public_url {
            config.public_url = Some(url);
        }
        if let Some(secret) = self.secret {
            config.secret = Some(secret);
        }
        if let Some(allow) = self.allow_dev_secret {
            config.allow_dev_secret = allow;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(endpoint) = self.s3_endpoint {
            config.s3_endpoint = Some(endpoint);
        }
        if let Some(region) = self.s3_region {
            config.s3_region = Some(region);
        }
        if let Some(endpoints) = self.relay_allowed_endpoints {
            config.relay_allowed_endpoints = endpoints;
        }
        if let Some(secs) = self.download_ttl_secs {
            if secs == 0 {
                return Err(ConfigError::InvalidTtl);
            }
            config.download_ttl = Duration::from_secs(secs);
        }
        if let Some(level) = self.log_level {
            config.log_level = parse_log_level(&level)?;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = Some(dir);
        }
        Ok(())
    }
}

pub fn parse_log_level(level: &str) -> Result<tracing::Level, ConfigError> {
    tracing::Level::from_str(level).map_err(|_| ConfigError::InvalidLogLevel(level.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("download_ttl_secs must be greater than zero")]
    InvalidTtl,
}
