//! Share metadata persistence.
//!
//! Records live inside the bucket they describe, one JSON object per share at
//! `.garage/shares/{id}.json`. The prefix is a naming convention only: anyone
//! who can list and read the bucket can see memo and expiry of every share.
//! Records never contain credentials.

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use common::share::ShareRecord;
use storage::{Bucket, StorageError};

/// Reserved prefix holding share records
pub const SHARES_PREFIX: &str = ".garage/shares/";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to encode share record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable CRUD over share records.
///
/// Every call takes the bucket the share belongs to; implementations that keep
/// records somewhere other than the bucket itself can key on [`Bucket::name`].
#[async_trait]
pub trait ShareStore: Send + Sync + Debug {
    /// Write a record, replacing any previous version.
    async fn put(&self, bucket: &Bucket, record: &ShareRecord) -> Result<(), StoreError>;

    /// Fetch a record. Missing and unreadable records are both `None`.
    async fn get(&self, bucket: &Bucket, id: Uuid) -> Result<Option<ShareRecord>, StoreError>;

    /// Remove a record. Removing a missing record succeeds.
    async fn delete(&self, bucket: &Bucket, id: Uuid) -> Result<(), StoreError>;

    /// Every readable record in the bucket. Corrupt records are skipped.
    async fn list(&self, bucket: &Bucket) -> Result<Vec<ShareRecord>, StoreError>;

    /// Read-modify-write a single record, returning the new version.
    ///
    /// Not atomic: two concurrent updates race and the last write wins, and a
    /// revoke landing between the read and the write is undone by the write.
    async fn update(
        &self,
        bucket: &Bucket,
        id: Uuid,
        mutate: &(dyn for<'r> Fn(&'r mut ShareRecord) + Send + Sync),
    ) -> Result<Option<ShareRecord>, StoreError> {
        let Some(mut record) = self.get(bucket, id).await? else {
            return Ok(None);
        };
        mutate(&mut record);
        self.put(bucket, &record).await?;
        Ok(Some(record))
    }
}

/// Stores records as objects inside the shared bucket.
#[derive(Debug, Clone, Default)]
pub struct ObjectShareStore;

impl ObjectShareStore {
    pub fn record_key(id: Uuid) -> String {
        format!("{}{}.json", SHARES_PREFIX, id)
    }

    fn parse(key: &str, data: &[u8]) -> Option<ShareRecord> {
        match serde_json::from_slice::<ShareRecord>(data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, error = %e, "skipping unreadable share record");
                None
            }
        }
    }
}

#[async_trait]
impl ShareStore for ObjectShareStore {
    async fn put(&self, bucket: &Bucket, record: &ShareRecord) -> Result<(), StoreError> {
        let data = serde_json::to_vec(record)?;
        bucket
            .put(
                &Self::record_key(record.id),
                Bytes::from(data),
                "application/json",
            )
            .await?;
        Ok(())
    }

    async fn get(&self, bucket: &Bucket, id: Uuid) -> Result<Option<ShareRecord>, StoreError> {
        let key = Self::record_key(id);
        let Some(data) = bucket.get(&key).await? else {
            return Ok(None);
        };
        Ok(Self::parse(&key, &data).filter(|record| record.id == id))
    }

    async fn delete(&self, bucket: &Bucket, id: Uuid) -> Result<(), StoreError> {
        bucket.delete(&Self::record_key(id)).await?;
        Ok(())
    }

    async fn list(&self, bucket: &Bucket) -> Result<Vec<ShareRecord>, StoreError> {
        let keys = bucket.list_keys(SHARES_PREFIX).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|key| key.ends_with(".json")) {
            match bucket.get(key).await {
                Ok(Some(data)) => records.extend(Self::parse(key, &data)),
                // deleted between the listing and the read
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "failed to read share record");
                }
            }
        }

        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use common::share::{CredentialDefaults, Credentials, Expiry};
    use storage::{Connector, MemoryConnector};

    use super::*;

    fn bucket() -> Bucket {
        let creds = Credentials::new("GK1", "secret").resolve(&CredentialDefaults::default());
        MemoryConnector::new().connect(&creds, "docs").unwrap()
    }

    #[test]
    fn test_record_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            ObjectShareStore::record_key(id),
            ".garage/shares/00000000-0000-0000-0000-000000000000.json"
        );
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let bucket = bucket();
        let store = ObjectShareStore;
        let record = ShareRecord::new("docs", "for Bob", 1, Expiry::Never);

        store.put(&bucket, &record).await.unwrap();
        assert_eq!(store.get(&bucket, record.id).await.unwrap(), Some(record.clone()));

        store.delete(&bucket, record.id).await.unwrap();
        assert_eq!(store.get(&bucket, record.id).await.unwrap(), None);

        // revoking twice is fine
        store.delete(&bucket, record.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_missing() {
        let bucket = bucket();
        let id = Uuid::new_v4();
        bucket
            .put(
                &ObjectShareStore::record_key(id),
                Bytes::from("{not json"),
                "application/json",
            )
            .await
            .unwrap();

        assert_eq!(ObjectShareStore.get(&bucket, id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_records() {
        let bucket = bucket();
        let store = ObjectShareStore;

        let first = ShareRecord::new("docs", "first", 1, Expiry::Never);
        let second = ShareRecord::new("docs", "second", 2, Expiry::At(10));
        store.put(&bucket, &first).await.unwrap();
        store.put(&bucket, &second).await.unwrap();
        bucket
            .put(
                &ObjectShareStore::record_key(Uuid::new_v4()),
                Bytes::from("garbage"),
                "application/json",
            )
            .await
            .unwrap();
        bucket
            .put("readme.txt", Bytes::from("hi"), "text/plain")
            .await
            .unwrap();

        let records = store.list(&bucket).await.unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let bucket = bucket();
        let updated = ObjectShareStore
            .update(&bucket, Uuid::new_v4(), &|record| {
                record.expires_at = Expiry::Never
            })
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_update_rewrites_record() {
        let bucket = bucket();
        let store = ObjectShareStore;
        let record = ShareRecord::new("docs", "memo", 1, Expiry::At(5));
        store.put(&bucket, &record).await.unwrap();

        let updated = store
            .update(&bucket, record.id, &|record| {
                record.expires_at = Expiry::At(99)
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.expires_at, Expiry::At(99));
        assert_eq!(updated.memo, "memo");
        assert_eq!(
            store.get(&bucket, record.id).await.unwrap().unwrap().expires_at,
            Expiry::At(99)
        );
    }
}
