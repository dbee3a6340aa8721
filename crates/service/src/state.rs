use std::sync::Arc;

use common::crypto::{EnvelopeCodec, EnvelopeKey, KeyError, DEV_SECRET};
use common::share::CredentialDefaults;
use storage::Connector;

use super::config::Config;
use super::executor::Executor;
use super::gateway::CapabilityGateway;
use super::manager::ShareManager;
use super::relay::{Relay, RelayPolicy};
use super::store::{ObjectShareStore, ShareStore};

/// Main service state - shared by every handler
#[derive(Debug, Clone)]
pub struct State {
    manager: Arc<ShareManager>,
    gateway: Arc<CapabilityGateway>,
    executor: Arc<Executor>,
    relay: Arc<Relay>,
    codec: EnvelopeCodec,
}

impl State {
    pub fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        Self::with_connector(config, config.storage.connector())
    }

    /// Build the state against an explicit storage connector.
    pub fn with_connector(
        config: &Config,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, StateSetupError> {
        // 1. Setup the envelope codec
        let codec = envelope_codec(config)?;

        // 2. Setup the share components over one store
        let store: Arc<dyn ShareStore> = Arc::new(ObjectShareStore);
        let defaults = CredentialDefaults {
            endpoint: config.s3_endpoint.clone(),
            region: config.s3_region.clone(),
        };
        let manager = ShareManager::new(connector.clone(), store.clone(), codec.clone(), defaults)
            .with_public_url(config.public_url.clone());
        let gateway = CapabilityGateway::new(connector, store, codec.clone());
        let executor = Executor::new(config.download_ttl);

        // 3. Setup the relay
        let relay = Relay::new(relay_policy(config)?)?;

        tracing::info!(
            storage = ?config.storage,
            endpoint_override = ?config.s3_endpoint,
            "service state ready"
        );

        Ok(Self {
            manager: Arc::new(manager),
            gateway: Arc::new(gateway),
            executor: Arc::new(executor),
            relay: Arc::new(relay),
            codec,
        })
    }

    pub fn manager(&self) -> &ShareManager {
        &self.manager
    }

    pub fn gateway(&self) -> &CapabilityGateway {
        &self.gateway
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }
}

fn envelope_codec(config: &Config) -> Result<EnvelopeCodec, StateSetupError> {
    let secret = config.secret.as_deref().unwrap_or(DEV_SECRET);
    if EnvelopeKey::is_dev_secret(secret) {
        if !config.allow_dev_secret {
            return Err(StateSetupError::InsecureSecret);
        }
        tracing::warn!(
            "using the development envelope secret, tokens minted by this instance can be forged by anyone"
        );
    }
    Ok(EnvelopeCodec::from_secret(secret)?)
}

/// An explicit allow-list wins, then the pinned storage endpoint. Without
/// either the relay will reach any http(s) origin.
fn relay_policy(config: &Config) -> Result<RelayPolicy, StateSetupError> {
    if !config.relay_allowed_endpoints.is_empty() {
        return Ok(RelayPolicy::allow(&config.relay_allowed_endpoints)?);
    }
    match &config.s3_endpoint {
        Some(endpoint) => Ok(RelayPolicy::allow([endpoint])?),
        None => {
            tracing::warn!("no relay allow-list configured, relaying to any storage endpoint");
            Ok(RelayPolicy::any())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("refusing to start with the development envelope secret")]
    InsecureSecret,
    #[error("invalid envelope secret: {0}")]
    Secret(#[from] KeyError),
    #[error("invalid relay endpoint: {0}")]
    RelayEndpoint(#[from] url::ParseError),
    #[error("failed to build relay client: {0}")]
    RelayClient(#[from] reqwest::Error),
}
