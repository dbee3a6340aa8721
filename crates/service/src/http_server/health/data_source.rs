use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use uuid::Uuid;

use common::crypto::EnvelopeCodec;
use common::share::{CredentialDefaults, Credentials, EnvelopePayload};

use crate::ServiceState;

#[async_trait]
pub trait DataSource {
    /// Perform various checks on the system to ensure its healthy and ready to accept requests.
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("one or more dependent services aren't available")]
    DependencyFailure,

    #[allow(dead_code)]
    #[error("service has received signal indicating it should shutdown")]
    ShuttingDown,
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

pub struct StateDataSource(DynDataSource);

impl Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDataSource").finish()
    }
}

impl StateDataSource {
    #[cfg(test)]
    pub fn new(dds: DynDataSource) -> Self {
        Self(dds)
    }
}

impl Deref for StateDataSource {
    type Target = DynDataSource;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Storage is opened per request with caller credentials, so the only
/// dependency owned by the process is the envelope key.
struct EnvelopeSource {
    codec: EnvelopeCodec,
}

#[async_trait]
impl DataSource for EnvelopeSource {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        let creds = Credentials::new("readiness", "readiness").resolve(&CredentialDefaults::default());
        let probe = EnvelopePayload::new(Uuid::nil(), "readiness", &creds);
        let token = self
            .codec
            .seal(&probe)
            .map_err(|_| DataSourceError::DependencyFailure)?;
        let opened: EnvelopePayload = self
            .codec
            .open(&token)
            .map_err(|_| DataSourceError::DependencyFailure)?;
        if opened.id != probe.id {
            return Err(DataSourceError::DependencyFailure);
        }
        Ok(())
    }
}

#[async_trait]
impl FromRequestParts<ServiceState> for StateDataSource {
    type Rejection = ();

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        Ok(StateDataSource(Arc::new(EnvelopeSource {
            codec: state.codec().clone(),
        })))
    }
}
