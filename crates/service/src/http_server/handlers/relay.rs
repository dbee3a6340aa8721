use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::relay::RelayError;
use crate::ServiceState;

/// Stream a download reference through to storage.
#[tracing::instrument(skip_all, fields(path = uri.path()))]
pub async fn relay_handler(
    State(state): State<ServiceState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    state.relay().forward(method, &uri, &headers).await
}
