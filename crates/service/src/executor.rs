//! The read operations a share grants.
//!
//! There are exactly two: list objects and produce a download reference. No
//! other storage verb is reachable from here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use storage::{ListPage, ListQuery, DEFAULT_DELIMITER, MAX_KEYS};

use crate::error::ShareError;
use crate::gateway::ScopedContext;
use crate::relay;

/// Lifetime of the signed URL behind a download reference
pub const DEFAULT_DOWNLOAD_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecipientAction {
    List,
    PresignGet,
}

/// Loose request parameters as sent by the share page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_keys: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A recipient operation after validation.
#[derive(Debug, Clone)]
pub enum RecipientOp {
    List(ListQuery),
    PresignGet { key: String },
}

impl RecipientOp {
    pub fn from_request(
        action: RecipientAction,
        params: RecipientParams,
    ) -> Result<Self, ShareError> {
        match action {
            RecipientAction::List => Ok(RecipientOp::List(ListQuery {
                prefix: params.prefix.unwrap_or_default(),
                delimiter: Some(
                    params
                        .delimiter
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
                ),
                max_keys: params.max_keys.filter(|n| *n > 0).unwrap_or(MAX_KEYS),
                continuation_token: params.continuation_token.filter(|t| !t.is_empty()),
            })),
            RecipientAction::PresignGet => match params.key {
                Some(key) if !key.is_empty() => Ok(RecipientOp::PresignGet { key }),
                _ => Err(ShareError::InvalidRequest("missing key".to_string())),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReference {
    /// Relay path on this service's own origin
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientOutput {
    Listing(ListPage),
    Download(DownloadReference),
}

/// Runs recipient operations against a [`ScopedContext`].
#[derive(Debug, Clone)]
pub struct Executor {
    download_ttl: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TTL)
    }
}

impl Executor {
    pub fn new(download_ttl: Duration) -> Self {
        Self { download_ttl }
    }

    /// One page of the locked bucket. Continuation tokens pass through as-is.
    pub async fn list_objects(
        &self,
        ctx: &ScopedContext,
        query: &ListQuery,
    ) -> Result<ListPage, ShareError> {
        Ok(ctx.bucket().list_page(query).await?)
    }

    /// A relay path for `key`.
    ///
    /// The signed URL behind it stays valid for the configured lifetime even if
    /// the share expires or is revoked in the meantime.
    pub async fn download_reference(
        &self,
        ctx: &ScopedContext,
        key: &str,
    ) -> Result<DownloadReference, ShareError> {
        let signed = ctx.bucket().signed_get_url(key, self.download_ttl).await?;
        tracing::debug!(id = %ctx.share_id(), key, "download reference issued");
        Ok(DownloadReference {
            url: relay::relay_path(&signed),
        })
    }

    pub async fn execute(
        &self,
        ctx: &ScopedContext,
        op: RecipientOp,
    ) -> Result<RecipientOutput, ShareError> {
        match op {
            RecipientOp::List(query) => self
                .list_objects(ctx, &query)
                .await
                .map(RecipientOutput::Listing),
            RecipientOp::PresignGet { key } => self
                .download_reference(ctx, &key)
                .await
                .map(RecipientOutput::Download),
        }
    }
}
