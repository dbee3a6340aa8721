//! Operator-facing share lifecycle.
//!
//! The manager holds no state of its own beyond configuration. Every call opens
//! the bucket with the operator's credentials, so an operator can only manage
//! shares in buckets their own key can write to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use common::crypto::EnvelopeCodec;
use common::share::{CredentialDefaults, Credentials, EnvelopePayload, Expiry, ShareRecord};
use storage::{Bucket, Connector};

use crate::error::ShareError;
use crate::store::ShareStore;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Operations an operator can perform, dispatched by [`ShareManager::execute`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ShareOp {
    Create {
        bucket: String,
        config: Credentials,
        memo: String,
        expires_at: Expiry,
    },
    Update {
        bucket: String,
        config: Credentials,
        id: Uuid,
        expires_at: Expiry,
    },
    List {
        bucket: String,
        config: Credentials,
    },
    RegenerateToken {
        bucket: String,
        config: Credentials,
        id: Uuid,
    },
    Revoke {
        bucket: String,
        config: Credentials,
        id: Uuid,
    },
}

/// A freshly sealed token and where to send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedShare {
    pub id: Uuid,
    pub token: String,
    /// Full share link, when a public URL is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShareOpOutput {
    Records(Vec<ShareRecord>),
    Minted(MintedShare),
    Ack(Ack),
}

impl std::fmt::Display for ShareOpOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareOpOutput::Records(records) if records.is_empty() => write!(f, "no shares"),
            ShareOpOutput::Records(records) => {
                for record in records {
                    let expires = match record.expires_at {
                        Expiry::Never => "never".to_string(),
                        Expiry::At(ms) => chrono::DateTime::from_timestamp_millis(ms)
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| ms.to_string()),
                    };
                    writeln!(
                        f,
                        "{}  {}  expires {}  {}",
                        record.id, record.bucket, expires, record.memo
                    )?;
                }
                Ok(())
            }
            ShareOpOutput::Minted(minted) => match &minted.url {
                Some(url) => write!(f, "{}\n{}", minted.id, url),
                None => write!(f, "{}\n{}", minted.id, minted.token),
            },
            ShareOpOutput::Ack(_) => write!(f, "ok"),
        }
    }
}

/// Creates, updates, lists, revokes and re-issues shares.
#[derive(Debug, Clone)]
pub struct ShareManager {
    connector: Arc<dyn Connector>,
    store: Arc<dyn ShareStore>,
    codec: EnvelopeCodec,
    defaults: CredentialDefaults,
    public_url: Option<Url>,
}

impl ShareManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn ShareStore>,
        codec: EnvelopeCodec,
        defaults: CredentialDefaults,
    ) -> Self {
        Self {
            connector,
            store,
            codec,
            defaults,
            public_url: None,
        }
    }

    /// Base URL share links are built on, e.g. `https://console.example.com`.
    pub fn with_public_url(mut self, public_url: Option<Url>) -> Self {
        self.public_url = public_url;
        self
    }

    fn open_bucket(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<(Bucket, common::share::ResolvedCredentials), ShareError> {
        if bucket.is_empty() {
            return Err(ShareError::InvalidRequest("missing bucket".to_string()));
        }
        if !credentials.is_complete() {
            return Err(ShareError::InvalidRequest(
                "missing access key id or secret access key".to_string(),
            ));
        }
        let resolved = credentials.resolve(&self.defaults);
        let handle = self.connector.connect(&resolved, bucket)?;
        Ok((handle, resolved))
    }

    fn share_url(&self, id: Uuid, token: &str) -> Option<String> {
        self.public_url.as_ref().map(|base| {
            format!(
                "{}/share/{}?token={}",
                base.as_str().trim_end_matches('/'),
                id,
                token
            )
        })
    }

    fn mint(
        &self,
        id: Uuid,
        bucket: &str,
        credentials: &common::share::ResolvedCredentials,
    ) -> Result<MintedShare, ShareError> {
        let payload = EnvelopePayload::new(id, bucket, credentials);
        let token = self.codec.seal(&payload)?;
        Ok(MintedShare {
            id,
            url: self.share_url(id, &token),
            token,
        })
    }

    /// Persist a new share record and hand back its first token.
    ///
    /// Fails with a storage error when the operator's key cannot write to the
    /// bucket, since the record could not be persisted.
    #[tracing::instrument(skip(self, credentials, memo))]
    pub async fn create_share(
        &self,
        credentials: &Credentials,
        bucket: &str,
        memo: &str,
        expires_at: Expiry,
    ) -> Result<MintedShare, ShareError> {
        if memo.trim().is_empty() {
            return Err(ShareError::InvalidRequest("missing memo".to_string()));
        }
        let (handle, resolved) = self.open_bucket(credentials, bucket)?;

        let record = ShareRecord::new(bucket, memo, now_millis(), expires_at);
        self.store.put(&handle, &record).await?;
        tracing::info!(id = %record.id, bucket, "share created");

        self.mint(record.id, bucket, &resolved)
    }

    /// Seal a new token for an existing share. Earlier tokens stay valid.
    #[tracing::instrument(skip(self, credentials))]
    pub async fn regenerate_share_token(
        &self,
        credentials: &Credentials,
        bucket: &str,
        id: Uuid,
    ) -> Result<MintedShare, ShareError> {
        let (handle, resolved) = self.open_bucket(credentials, bucket)?;
        if self.store.get(&handle, id).await?.is_none() {
            return Err(ShareError::NotFound(id));
        }
        tracing::info!(%id, bucket, "share token regenerated");
        self.mint(id, bucket, &resolved)
    }

    /// Change the expiry of an existing share. Takes effect for every token
    /// already issued for it.
    #[tracing::instrument(skip(self, credentials))]
    pub async fn update_share(
        &self,
        credentials: &Credentials,
        bucket: &str,
        id: Uuid,
        expires_at: Expiry,
    ) -> Result<ShareRecord, ShareError> {
        let (handle, _) = self.open_bucket(credentials, bucket)?;
        let updated = self
            .store
            .update(&handle, id, &|record| record.expires_at = expires_at)
            .await?
            .ok_or(ShareError::NotFound(id))?;
        tracing::info!(%id, bucket, expires_at = expires_at.as_millis(), "share updated");
        Ok(updated)
    }

    #[tracing::instrument(skip(self, credentials))]
    pub async fn list_shares(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<Vec<ShareRecord>, ShareError> {
        let (handle, _) = self.open_bucket(credentials, bucket)?;
        Ok(self.store.list(&handle).await?)
    }

    /// Delete the share record. Idempotent.
    #[tracing::instrument(skip(self, credentials))]
    pub async fn revoke_share(
        &self,
        credentials: &Credentials,
        bucket: &str,
        id: Uuid,
    ) -> Result<(), ShareError> {
        let (handle, _) = self.open_bucket(credentials, bucket)?;
        self.store.delete(&handle, id).await?;
        tracing::info!(%id, bucket, "share revoked");
        Ok(())
    }

    pub async fn execute(&self, op: ShareOp) -> Result<ShareOpOutput, ShareError> {
        match op {
            ShareOp::Create {
                bucket,
                config,
                memo,
                expires_at,
            } => self
                .create_share(&config, &bucket, &memo, expires_at)
                .await
                .map(ShareOpOutput::Minted),
            ShareOp::Update {
                bucket,
                config,
                id,
                expires_at,
            } => self
                .update_share(&config, &bucket, id, expires_at)
                .await
                .map(|_| ShareOpOutput::Ack(Ack::ok())),
            ShareOp::List { bucket, config } => self
                .list_shares(&config, &bucket)
                .await
                .map(ShareOpOutput::Records),
            ShareOp::RegenerateToken { bucket, config, id } => self
                .regenerate_share_token(&config, &bucket, id)
                .await
                .map(ShareOpOutput::Minted),
            ShareOp::Revoke { bucket, config, id } => self
                .revoke_share(&config, &bucket, id)
                .await
                .map(|_| ShareOpOutput::Ack(Ack::ok())),
        }
    }
}
