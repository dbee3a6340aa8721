use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RecipientError, ShareError};
use crate::executor::{RecipientAction, RecipientOp, RecipientOutput, RecipientParams};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// A recipient request. The token is the only credential it carries.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub token: String,
    pub action: RecipientAction,
    #[serde(default)]
    pub params: RecipientParams,
}

impl std::fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("token", &"<redacted>")
            .field("action", &self.action)
            .field("params", &self.params)
            .finish()
    }
}

/// Every failure past body parsing looks the same to the caller.
#[tracing::instrument(skip_all)]
pub async fn handler(
    State(state): State<ServiceState>,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RecipientError> {
    let Json(req) = payload.map_err(|e| ShareError::InvalidRequest(e.body_text()))?;
    tracing::debug!(action = ?req.action, "recipient request");

    let ctx = state
        .gateway()
        .authorize(&req.token, req.params.bucket.as_deref())
        .await?;
    let op = RecipientOp::from_request(req.action, req.params)?;
    let output = state.executor().execute(&ctx, op).await?;
    Ok((http::StatusCode::OK, Json(output)))
}

impl ApiRequest for ProxyRequest {
    type Response = RecipientOutput;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.post(super::share_url(base_url, "/proxy")).json(&self)
    }
}
