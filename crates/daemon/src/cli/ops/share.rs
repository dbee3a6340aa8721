use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use uuid::Uuid;

use common::share::{Credentials, Expiry};
use service::http_server::api::client::ApiError;
use service::http_server::api::v0::share::revoke::RevokeBody;
use service::http_server::api::v0::share::update::UpdateBody;
use service::http_server::api::v0::share::{RevokeRequest, UpdateRequest};
use service::{ShareOp, ShareOpOutput};

use crate::cli::op::{Op, OpContext};

crate::command_enum! {
    (Create, Create),
    (List, List),
    (Update, Update),
    (Revoke, Revoke),
    (Token, Token),
}

pub type ShareCommand = Command;

/// Manage share links on a running daemon
#[derive(Args, Debug, Clone)]
pub struct Share {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[async_trait::async_trait]
impl Op for Share {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Storage credentials of the bucket owner. Sent to the daemon, which seals
/// them into the token; they never appear in share records.
#[derive(Args, Clone)]
pub struct CredentialArgs {
    #[arg(long, env = "GARAGE_ACCESS_KEY_ID")]
    pub access_key_id: String,

    #[arg(long, env = "GARAGE_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: String,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for CredentialArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialArgs")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl CredentialArgs {
    fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new(&self.access_key_id, &self.secret_access_key);
        if let Some(region) = &self.region {
            credentials = credentials.with_region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            credentials = credentials.with_endpoint(endpoint);
        }
        credentials
    }
}

/// Without either flag the share never expires.
#[derive(Args, Debug, Clone)]
pub struct ExpiryArgs {
    /// Expiry as an RFC 3339 timestamp
    #[arg(long, conflicts_with = "expires_in_hours")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Expiry relative to now
    #[arg(long)]
    pub expires_in_hours: Option<u32>,
}

impl ExpiryArgs {
    fn expiry_at(&self, now: DateTime<Utc>) -> Expiry {
        match (self.expires_at, self.expires_in_hours) {
            (Some(at), _) => Expiry::At(at.timestamp_millis()),
            (None, Some(hours)) => {
                Expiry::At((now + Duration::hours(i64::from(hours))).timestamp_millis())
            }
            (None, None) => Expiry::Never,
        }
    }

    fn expiry(&self) -> Expiry {
        self.expiry_at(Utc::now())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShareCliError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("expiry must not be before 1970")]
    InvalidExpiry,
}

/// Create a share and print its id and link
#[derive(Args, Debug, Clone)]
pub struct Create {
    pub bucket: String,

    /// Who or what the share is for
    #[arg(long)]
    pub memo: String,

    #[command(flatten)]
    pub expiry: ExpiryArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[async_trait::async_trait]
impl Op for Create {
    type Error = ShareCliError;
    type Output = ShareOpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let expires_at = checked(self.expiry.expiry())?;
        let mut client = ctx.client.clone();
        Ok(client
            .call(ShareOp::Create {
                bucket: self.bucket.clone(),
                config: self.credentials.credentials(),
                memo: self.memo.clone(),
                expires_at,
            })
            .await?)
    }
}

/// List shares in a bucket
#[derive(Args, Debug, Clone)]
pub struct List {
    pub bucket: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[async_trait::async_trait]
impl Op for List {
    type Error = ShareCliError;
    type Output = ShareOpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        Ok(client
            .call(ShareOp::List {
                bucket: self.bucket.clone(),
                config: self.credentials.credentials(),
            })
            .await?)
    }
}

/// Change when a share expires
#[derive(Args, Debug, Clone)]
pub struct Update {
    pub bucket: String,

    pub id: Uuid,

    #[command(flatten)]
    pub expiry: ExpiryArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[async_trait::async_trait]
impl Op for Update {
    type Error = ShareCliError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let expires_at = checked(self.expiry.expiry())?;
        let mut client = ctx.client.clone();
        client
            .call(UpdateRequest {
                id: self.id,
                body: UpdateBody {
                    bucket: self.bucket.clone(),
                    config: self.credentials.credentials(),
                    expires_at,
                },
            })
            .await?;
        Ok(format!("share {} updated", self.id))
    }
}

/// Revoke a share. Every token issued for it stops working.
#[derive(Args, Debug, Clone)]
pub struct Revoke {
    pub bucket: String,

    pub id: Uuid,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[async_trait::async_trait]
impl Op for Revoke {
    type Error = ShareCliError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        client
            .call(RevokeRequest {
                id: self.id,
                body: RevokeBody {
                    bucket: self.bucket.clone(),
                    config: self.credentials.credentials(),
                },
            })
            .await?;
        Ok(format!("share {} revoked", self.id))
    }
}

/// Issue an additional token for an existing share
#[derive(Args, Debug, Clone)]
pub struct Token {
    pub bucket: String,

    pub id: Uuid,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[async_trait::async_trait]
impl Op for Token {
    type Error = ShareCliError;
    type Output = ShareOpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        Ok(client
            .call(ShareOp::RegenerateToken {
                bucket: self.bucket.clone(),
                config: self.credentials.credentials(),
                id: self.id,
            })
            .await?)
    }
}

fn checked(expiry: Expiry) -> Result<Expiry, ShareCliError> {
    match expiry {
        Expiry::At(ms) if ms < 0 => Err(ShareCliError::InvalidExpiry),
        expiry => Ok(expiry),
    }
}
