use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use common::share::ResolvedCredentials;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bucket::Bucket;
use crate::error::{Result, StorageError};
use crate::memory::MemorySigner;

/// Which storage backend buckets are opened against.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// S3-compatible cluster reached through the credentials carried by each request
    #[default]
    S3,
    /// In-process storage (for testing and local development)
    Memory,
}

impl StorageConfig {
    pub fn connector(&self) -> Arc<dyn Connector> {
        match self {
            StorageConfig::S3 => Arc::new(S3Connector),
            StorageConfig::Memory => Arc::new(MemoryConnector::new()),
        }
    }
}

/// Opens bucket handles from a set of credentials.
///
/// Every share carries its own credentials, so a connection is made per request
/// rather than once at startup.
pub trait Connector: Send + Sync + Debug {
    fn connect(&self, credentials: &ResolvedCredentials, bucket: &str) -> Result<Bucket>;
}

/// Connects to an S3-compatible endpoint using path-style addressing.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl Connector for S3Connector {
    fn connect(&self, credentials: &ResolvedCredentials, bucket: &str) -> Result<Bucket> {
        if bucket.is_empty() {
            return Err(StorageError::InvalidConfig(
                "bucket name must not be empty".to_string(),
            ));
        }
        let endpoint = credentials.endpoint.as_str();
        tracing::debug!(bucket, endpoint, "opening s3 bucket");

        let store = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key)
            .with_bucket_name(bucket)
            .with_region(&credentials.region)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(endpoint.starts_with("http://"))
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        let store = Arc::new(store);
        Ok(Bucket::new(bucket, store.clone(), store))
    }
}

/// Keeps buckets in memory, keyed by name.
///
/// Buckets are shared across connections made through the same connector, so
/// data written through one handle is visible through every other.
#[derive(Debug)]
pub struct MemoryConnector {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
    auto_create: bool,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// A connector that creates buckets on first use.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            auto_create: true,
        }
    }

    /// A connector that only knows the given buckets.
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = names
            .into_iter()
            .map(|name| (name.into(), Arc::new(InMemory::new())))
            .collect();
        Self {
            buckets: Mutex::new(buckets),
            auto_create: false,
        }
    }

    fn store(&self, bucket: &str) -> Result<Arc<InMemory>> {
        let mut buckets = self.buckets.lock();
        if let Some(store) = buckets.get(bucket) {
            return Ok(store.clone());
        }
        if !self.auto_create {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        let store = Arc::new(InMemory::new());
        buckets.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, credentials: &ResolvedCredentials, bucket: &str) -> Result<Bucket> {
        if bucket.is_empty() {
            return Err(StorageError::InvalidConfig(
                "bucket name must not be empty".to_string(),
            ));
        }
        let endpoint = Url::parse(&credentials.endpoint)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid endpoint: {}", e)))?;

        let store = self.store(bucket)?;
        let signer = Arc::new(MemorySigner::new(endpoint, bucket));
        Ok(Bucket::new(bucket, store, signer))
    }
}
