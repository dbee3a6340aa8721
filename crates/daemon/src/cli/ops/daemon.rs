use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use url::Url;

use service::process::spawn_service;
use service::{ConfigError, FileConfig, ServiceConfig};
use storage::StorageConfig;

#[derive(Args, Clone)]
pub struct Daemon {
    /// Address to serve the API and download relay on
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Secret the envelope key is derived from
    #[arg(long, env = "SHARE_ENCRYPTION_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Accept the documented development secret. Never in production.
    #[arg(long)]
    pub allow_dev_secret: bool,

    /// Keep buckets in memory instead of talking to S3
    #[arg(long)]
    pub memory_storage: bool,

    /// Storage endpoint that overrides whatever operators submit
    #[arg(long, env = "S3_API_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Region that overrides whatever operators submit
    #[arg(long, env = "S3_API_REGION")]
    pub s3_region: Option<String>,

    /// Console base URL share links are built on (e.g., https://console.example.com)
    #[arg(long)]
    pub public_url: Option<Url>,

    /// Storage endpoint the download relay may reach (repeatable)
    #[arg(long = "relay-allow")]
    pub relay_allowed_endpoints: Vec<String>,

    /// Lifetime of download references in seconds
    #[arg(long)]
    pub download_ttl_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("listen_addr", &self.listen_addr)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("allow_dev_secret", &self.allow_dev_secret)
            .field("memory_storage", &self.memory_storage)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_region", &self.s3_region)
            .field("public_url", &self.public_url)
            .field("relay_allowed_endpoints", &self.relay_allowed_endpoints)
            .field("download_ttl_secs", &self.download_ttl_secs)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl Daemon {
    /// Defaults, then the config file, then flags and environment.
    fn service_config(
        &self,
        config_path: Option<&std::path::Path>,
    ) -> Result<ServiceConfig, DaemonError> {
        let mut config = ServiceConfig::default();

        if let Some(path) = crate::cli::op::config_file(config_path) {
            FileConfig::load(&path)?.apply(&mut config)?;
        }

        let overrides = FileConfig {
            listen_addr: self.listen_addr,
            public_url: self.public_url.clone(),
            secret: self.secret.clone(),
            allow_dev_secret: self.allow_dev_secret.then_some(true),
            storage: self.memory_storage.then_some(StorageConfig::Memory),
            s3_endpoint: self.s3_endpoint.clone(),
            s3_region: self.s3_region.clone(),
            relay_allowed_endpoints: (!self.relay_allowed_endpoints.is_empty())
                .then(|| self.relay_allowed_endpoints.clone()),
            download_ttl_secs: self.download_ttl_secs,
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
        };
        overrides.apply(&mut config)?;

        Ok(config)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = self.service_config(ctx.config_path.as_deref())?;
        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
