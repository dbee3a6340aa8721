use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use common::crypto::EnvelopeError;
use storage::StorageError;

use crate::store::StoreError;

/// Generic rejection returned to token bearers, whatever went wrong.
pub const RECIPIENT_REJECTION: &str = "invalid or expired token";

/// Everything that can go wrong minting, checking or using a share.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("invalid token")]
    Authentication,
    #[error("invalid bucket")]
    Authorization,
    #[error("share {0} not found or revoked")]
    NotFound(Uuid),
    #[error("share {0} has expired")]
    Expired(Uuid),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EnvelopeError> for ShareError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Decode(msg) => ShareError::Decode(msg),
            EnvelopeError::Authentication => ShareError::Authentication,
            EnvelopeError::Seal(msg) => ShareError::Internal(msg),
        }
    }
}

impl From<StorageError> for ShareError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) | StorageError::InvalidContinuationToken => {
                ShareError::InvalidRequest(err.to_string())
            }
            _ => ShareError::Storage(err.to_string()),
        }
    }
}

impl From<StoreError> for ShareError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Storage(e) => e.into(),
            StoreError::Encode(e) => ShareError::Internal(e.to_string()),
        }
    }
}

impl ShareError {
    /// True for failures that mean "this token does not grant access".
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ShareError::Decode(_)
                | ShareError::Authentication
                | ShareError::Authorization
                | ShareError::NotFound(_)
                | ShareError::Expired(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            ShareError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ShareError::NotFound(_) => StatusCode::NOT_FOUND,
            ShareError::Decode(_) | ShareError::Authentication => StatusCode::UNAUTHORIZED,
            ShareError::Authorization | ShareError::Expired(_) => StatusCode::FORBIDDEN,
            ShareError::Storage(_) => StatusCode::BAD_GATEWAY,
            ShareError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Operator-facing rendering: the caller is trusted, so the message is kept.
impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "share operation failed");
        } else {
            tracing::warn!(error = %self, "share request rejected");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Recipient-facing rendering of a [`ShareError`].
///
/// Collapses every failure to the same 401 so a bearer cannot tell a forged
/// token from a revoked share, an expired one or a storage outage.
#[derive(Debug)]
pub struct RecipientError(pub ShareError);

impl From<ShareError> for RecipientError {
    fn from(err: ShareError) -> Self {
        Self(err)
    }
}

impl IntoResponse for RecipientError {
    fn into_response(self) -> Response {
        if self.0.is_rejection() {
            tracing::debug!(reason = %self.0, "recipient request rejected");
        } else {
            tracing::warn!(error = %self.0, "recipient request failed");
        }
        let body = serde_json::json!({ "error": RECIPIENT_REJECTION });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
