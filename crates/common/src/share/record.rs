use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Permissions a share grants. Fixed for every share; see [`SHARE_PERMISSIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    List,
    Read,
    /// Anything else found in a stored record. Grants nothing.
    #[serde(other)]
    Unknown,
}

/// Written into every record. Enforcement never reads the stored field.
pub const SHARE_PERMISSIONS: [Permission; 2] = [Permission::List, Permission::Read];

#[derive(Debug, thiserror::Error)]
pub enum ExpiryError {
    #[error("expiresAt must be -1 (never) or a non-negative epoch-millisecond value, got {0}")]
    Invalid(i64),
}

/// When a share stops validating.
///
/// On the wire this is epoch milliseconds, with `-1` meaning the share never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    At(i64),
}

impl Expiry {
    pub const NEVER_SENTINEL: i64 = -1;

    pub fn from_millis(ms: i64) -> Result<Self, ExpiryError> {
        match ms {
            Self::NEVER_SENTINEL => Ok(Expiry::Never),
            ms if ms >= 0 => Ok(Expiry::At(ms)),
            ms => Err(ExpiryError::Invalid(ms)),
        }
    }

    pub fn as_millis(&self) -> i64 {
        match self {
            Expiry::Never => Self::NEVER_SENTINEL,
            Expiry::At(ms) => *ms,
        }
    }

    /// A share expiring at `t` is still valid at exactly `t`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(ms) => now_ms > *ms,
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_millis())
    }
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Expiry::from_millis(ms).map_err(serde::de::Error::custom)
    }
}

/// Durable metadata for a single share, persisted as JSON inside the shared bucket.
///
/// The record existing is what makes the share active; deleting it is revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub id: Uuid,
    pub bucket: String,
    pub memo: String,
    /// Epoch milliseconds
    pub created_at: i64,
    pub expires_at: Expiry,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl ShareRecord {
    /// Build a fresh record with a new random id and the fixed permission set.
    pub fn new(
        bucket: impl Into<String>,
        memo: impl Into<String>,
        created_at: i64,
        expires_at: Expiry,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bucket: bucket.into(),
            memo: memo.into(),
            created_at,
            expires_at,
            permissions: SHARE_PERMISSIONS.to_vec(),
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_expired_at(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_sentinel() {
        assert_eq!(Expiry::from_millis(-1).unwrap(), Expiry::Never);
        assert_eq!(Expiry::from_millis(0).unwrap(), Expiry::At(0));
        assert!(Expiry::from_millis(-2).is_err());
        assert_eq!(Expiry::Never.as_millis(), -1);
    }

    #[test]
    fn test_never_expires_even_far_in_the_future() {
        assert!(!Expiry::Never.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_expiry_boundary() {
        let expiry = Expiry::At(1_000);
        assert!(!expiry.is_expired_at(999));
        assert!(!expiry.is_expired_at(1_000));
        assert!(expiry.is_expired_at(1_001));
    }

    #[test]
    fn test_record_json_layout() {
        let record = ShareRecord::new("docs", "for Bob", 1_700_000_000_000, Expiry::Never);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["bucket"], "docs");
        assert_eq!(json["memo"], "for Bob");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert_eq!(json["expiresAt"], -1);
        assert_eq!(json["permissions"], serde_json::json!(["LIST", "READ"]));
    }

    #[test]
    fn test_unknown_permissions_parse_but_grant_nothing() {
        let json = r#"{
            "id": "7f1b1a3c-8f6e-4f43-9a7c-1a2b3c4d5e6f",
            "bucket": "docs",
            "memo": "legacy",
            "createdAt": 1,
            "expiresAt": 2,
            "permissions": ["LIST", "READ", "WRITE", "OWNER"]
        }"#;
        let record: ShareRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.permissions,
            vec![
                Permission::List,
                Permission::Read,
                Permission::Unknown,
                Permission::Unknown
            ]
        );
    }
}
