//! Shared setup for service integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;

use ::common::share::{CredentialDefaults, Credentials};
use service::{ServiceConfig, ServiceState};
use storage::{Bucket, Connector, MemoryConnector, StorageConfig};

pub const SECRET: &str = "integration-test-secret-0123456789";

pub const ONE_HOUR_MS: i64 = 3_600_000;

pub struct TestService {
    pub state: ServiceState,
    pub connector: Arc<MemoryConnector>,
}

impl TestService {
    pub fn router(&self) -> Router {
        service::http_server::router(self.state.clone(), tracing::Level::DEBUG)
    }

    /// Open `bucket` directly, bypassing the share machinery.
    pub fn bucket(&self, bucket: &str) -> Bucket {
        let resolved = credentials().resolve(&CredentialDefaults::default());
        self.connector.connect(&resolved, bucket).unwrap()
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: &'static [u8]) {
        self.bucket(bucket)
            .put(key, Bytes::from_static(data), "text/plain")
            .await
            .unwrap();
    }
}

pub fn config() -> ServiceConfig {
    ServiceConfig {
        secret: Some(SECRET.to_string()),
        storage: StorageConfig::Memory,
        ..Default::default()
    }
}

pub fn setup() -> TestService {
    setup_with(config())
}

pub fn setup_with(config: ServiceConfig) -> TestService {
    let connector = Arc::new(MemoryConnector::new());
    let state = ServiceState::with_connector(&config, connector.clone()).unwrap();
    TestService { state, connector }
}

/// Operator credentials used throughout the tests
pub fn credentials() -> Credentials {
    Credentials::new("GK31c2f218a2e44f485b94239e", "0123456789abcdef0123456789abcdef")
}

/// Send a JSON request through `router` and decode the JSON answer.
pub async fn send_json(
    router: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
