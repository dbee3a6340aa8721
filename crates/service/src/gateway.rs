//! Request-time enforcement of share tokens.
//!
//! Every recipient request passes through [`CapabilityGateway::authorize`].
//! The steps run in a fixed order and the first failure ends the request:
//!
//! 1. open the token under the server key
//! 2. compare the requested bucket (if any) with the token's bucket lock
//! 3. load the share record from the locked bucket
//! 4. check the record's current expiry
//!
//! Expiry comes only from the record, never from the token, so editing a
//! record changes the outcome for every token bound to it.

use std::sync::Arc;

use uuid::Uuid;

use common::crypto::EnvelopeCodec;
use common::share::EnvelopePayload;
use storage::{Bucket, Connector};

use crate::error::ShareError;
use crate::manager::now_millis;
use crate::store::ShareStore;

/// Bucket access unlocked by a valid token.
///
/// Only the read operations in [`crate::executor`] accept one, and it is
/// dropped at the end of the request.
#[derive(Debug)]
pub struct ScopedContext {
    share_id: Uuid,
    bucket: Bucket,
}

impl ScopedContext {
    pub fn share_id(&self) -> Uuid {
        self.share_id
    }

    pub fn bucket_name(&self) -> &str {
        self.bucket.name()
    }

    pub(crate) fn bucket(&self) -> &Bucket {
        &self.bucket
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityGateway {
    connector: Arc<dyn Connector>,
    store: Arc<dyn ShareStore>,
    codec: EnvelopeCodec,
}

impl CapabilityGateway {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn ShareStore>,
        codec: EnvelopeCodec,
    ) -> Self {
        Self {
            connector,
            store,
            codec,
        }
    }

    /// Validate `token` against the current share state.
    ///
    /// `requested_bucket` is whatever bucket the caller asked for. A mismatch
    /// is rejected; otherwise the token's own bucket is always used.
    pub async fn authorize(
        &self,
        token: &str,
        requested_bucket: Option<&str>,
    ) -> Result<ScopedContext, ShareError> {
        self.authorize_at(token, requested_bucket, now_millis()).await
    }

    /// [`Self::authorize`] with an explicit clock, in epoch milliseconds.
    pub async fn authorize_at(
        &self,
        token: &str,
        requested_bucket: Option<&str>,
        now_ms: i64,
    ) -> Result<ScopedContext, ShareError> {
        let payload: EnvelopePayload = self.codec.open(token)?;

        if let Some(requested) = requested_bucket {
            if requested != payload.bucket {
                return Err(ShareError::Authorization);
            }
        }

        let bucket = self
            .connector
            .connect(&payload.credentials(), &payload.bucket)?;

        let record = self
            .store
            .get(&bucket, payload.id)
            .await?
            .ok_or(ShareError::NotFound(payload.id))?;

        if record.is_expired_at(now_ms) {
            return Err(ShareError::Expired(record.id));
        }

        tracing::debug!(id = %payload.id, bucket = %payload.bucket, "share token accepted");
        Ok(ScopedContext {
            share_id: payload.id,
            bucket,
        })
    }
}
