use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use url::Url;

const STORE: &str = "InMemory";

/// Signs URLs for the in-memory backend.
///
/// The URLs have the same shape as path-style S3 presigned URLs but carry no
/// real signature. Nothing serves them; they exist so the download path can be
/// exercised without a cluster.
#[derive(Debug, Clone)]
pub(crate) struct MemorySigner {
    endpoint: Url,
    bucket: String,
}

impl MemorySigner {
    pub(crate) fn new(endpoint: Url, bucket: impl Into<String>) -> Self {
        Self {
            endpoint,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Signer for MemorySigner {
    async fn signed_url(
        &self,
        method: Method,
        path: &ObjectPath,
        expires_in: Duration,
    ) -> object_store::Result<Url> {
        let raw = format!(
            "{}/{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            self.bucket,
            path
        );
        let mut url = Url::parse(&raw).map_err(|e| object_store::Error::Generic {
            store: STORE,
            source: Box::new(e),
        })?;

        url.query_pairs_mut()
            .append_pair("X-Amz-Method", method.as_str())
            .append_pair("X-Amz-Expires", &expires_in.as_secs().to_string())
            .append_pair("X-Amz-Credential", "memory");

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_url_shape() {
        let signer = MemorySigner::new(Url::parse("http://localhost:3900/").unwrap(), "docs");
        let url = signer
            .signed_url(
                Method::GET,
                &ObjectPath::from("photos/cat.jpg"),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(url.path(), "/docs/photos/cat.jpg");
        assert_eq!(url.port(), Some(3900));
        let query = url.query().unwrap();
        assert!(query.contains("X-Amz-Expires=60"));
        assert!(query.contains("X-Amz-Method=GET"));
    }
}
