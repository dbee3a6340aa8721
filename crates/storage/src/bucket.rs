use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions};
use url::Url;

use crate::error::{Result, StorageError};
use crate::listing::{self, ListPage, ListQuery};

/// A handle on a single bucket, bound to the credentials it was opened with.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    inner: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}

impl Bucket {
    pub fn new(
        name: impl Into<String>,
        inner: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            name: name.into(),
            inner,
            signer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the storage path for an object key.
    fn object_path(key: &str) -> Result<ObjectPath> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        ObjectPath::parse(key).map_err(|_| StorageError::InvalidKey(key.to_string()))
    }

    /// Get an object, `None` if it does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = Self::object_path(key)?;
        match self.inner.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write an object, replacing whatever was there.
    pub async fn put(&self, key: &str, data: Bytes, content_type: &'static str) -> Result<()> {
        let path = Self::object_path(key)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        self.inner.put_opts(&path, data.into(), opts).await?;
        Ok(())
    }

    /// Delete an object. Deleting a missing object is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = Self::object_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List every key below a directory-style prefix such as `".garage/shares/"`.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = listing::directory_path(prefix)?;
        let items: Vec<_> = self.inner.list(dir.as_ref()).try_collect().await?;

        Ok(items
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    /// List one page of objects and common prefixes.
    pub async fn list_page(&self, query: &ListQuery) -> Result<ListPage> {
        listing::list_page(self.inner.as_ref(), query).await
    }

    /// Produce a signed GET URL for `key`, valid for `expires_in`.
    pub async fn signed_get_url(&self, key: &str, expires_in: Duration) -> Result<Url> {
        let path = Self::object_path(key)?;
        let url = self
            .signer
            .signed_url(Method::GET, &path, expires_in)
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use common::share::{CredentialDefaults, Credentials};

    use super::*;
    use crate::connector::{Connector, MemoryConnector};

    fn bucket() -> Bucket {
        let creds = Credentials::new("GK1", "secret")
            .with_endpoint("http://garage.internal:3900")
            .resolve(&CredentialDefaults::default());
        MemoryConnector::new().connect(&creds, "docs").unwrap()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let bucket = bucket();

        bucket
            .put("notes/a.txt", Bytes::from("hello"), "text/plain")
            .await
            .unwrap();
        assert_eq!(
            bucket.get("notes/a.txt").await.unwrap(),
            Some(Bytes::from("hello"))
        );

        bucket.delete("notes/a.txt").await.unwrap();
        assert!(bucket.get("notes/a.txt").await.unwrap().is_none());

        // second delete is a no-op
        bucket.delete("notes/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_under_prefix() {
        let bucket = bucket();
        for key in [".garage/shares/a.json", ".garage/shares/b.json", "readme.txt"] {
            bucket.put(key, Bytes::from("{}"), "application/json").await.unwrap();
        }

        let mut keys = bucket.list_keys(".garage/shares/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![".garage/shares/a.json", ".garage/shares/b.json"]);
    }

    #[tokio::test]
    async fn test_punctuated_folders_list_their_contents() {
        let bucket = bucket();
        for key in ["reports [2024]/q1.pdf", "~alice/notes.txt", "plain/a.txt"] {
            bucket.put(key, Bytes::from("x"), "text/plain").await.unwrap();
        }

        assert_eq!(
            bucket.list_keys("reports [2024]/").await.unwrap(),
            vec!["reports [2024]/q1.pdf"]
        );

        let query = ListQuery {
            prefix: "~alice/".to_string(),
            ..Default::default()
        };
        let page = bucket.list_page(&query).await.unwrap();
        let keys: Vec<_> = page.contents.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["~alice/notes.txt"]);
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let bucket = bucket();
        assert!(matches!(
            bucket.get("").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            bucket.get("a//b").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_url_points_at_endpoint() {
        let url = bucket()
            .signed_get_url("readme.txt", Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(url.host_str(), Some("garage.internal"));
        assert_eq!(url.path(), "/docs/readme.txt");
        assert!(url.query().unwrap_or_default().contains("X-Amz-Expires=3600"));
    }
}
