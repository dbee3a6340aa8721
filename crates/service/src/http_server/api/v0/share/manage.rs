use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::error::ShareError;
use crate::http_server::api::client::ApiRequest;
use crate::manager::{ShareOp, ShareOpOutput};
use crate::ServiceState;

/// Operator entry point: one tagged body per share operation.
#[tracing::instrument(skip_all)]
pub async fn handler(
    State(state): State<ServiceState>,
    payload: Result<Json<ShareOp>, JsonRejection>,
) -> Result<impl IntoResponse, ShareError> {
    let Json(op) = payload.map_err(|e| ShareError::InvalidRequest(e.body_text()))?;
    let output = state.manager().execute(op).await?;
    Ok((http::StatusCode::OK, Json(output)))
}

impl ApiRequest for ShareOp {
    type Response = ShareOpOutput;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.post(super::share_url(base_url, "")).json(&self)
    }
}
