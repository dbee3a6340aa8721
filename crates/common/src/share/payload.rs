use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credentials::ResolvedCredentials;

/// The secret content of a share token.
///
/// Built fresh every time a token is minted and only ever held in memory before
/// it is sealed or right after it is opened. Deliberately carries no expiry: the
/// share record in the bucket is the only source of truth for that.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopePayload {
    /// Id of the share record this token is bound to
    pub id: Uuid,
    /// The bucket this token is locked to
    pub bucket: String,
    pub ak: String,
    pub sk: String,
    pub region: String,
    pub endpoint: String,
}

impl fmt::Debug for EnvelopePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopePayload")
            .field("id", &self.id)
            .field("bucket", &self.bucket)
            .field("ak", &self.ak)
            .field("sk", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl EnvelopePayload {
    pub fn new(id: Uuid, bucket: impl Into<String>, credentials: &ResolvedCredentials) -> Self {
        Self {
            id,
            bucket: bucket.into(),
            ak: credentials.access_key_id.clone(),
            sk: credentials.secret_access_key.clone(),
            region: credentials.region.clone(),
            endpoint: credentials.endpoint.clone(),
        }
    }

    pub fn credentials(&self) -> ResolvedCredentials {
        ResolvedCredentials {
            access_key_id: self.ak.clone(),
            secret_access_key: self.sk.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_names() {
        let creds = ResolvedCredentials {
            access_key_id: "GK1".to_string(),
            secret_access_key: "s3cr3t".to_string(),
            region: "garage".to_string(),
            endpoint: "http://localhost:3900".to_string(),
        };
        let payload = EnvelopePayload::new(Uuid::nil(), "docs", &creds);
        let json = serde_json::to_value(&payload).unwrap();

        for field in ["id", "bucket", "ak", "sk", "region", "endpoint"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(payload.credentials(), creds);
    }
}
