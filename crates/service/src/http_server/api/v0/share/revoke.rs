use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use common::share::Credentials;

use crate::error::ShareError;
use crate::http_server::api::client::ApiRequest;
use crate::manager::Ack;
use crate::ServiceState;

/// Body of `DELETE /api/v0/share/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeBody {
    pub bucket: String,
    pub config: Credentials,
}

#[derive(Debug, Clone)]
pub struct RevokeRequest {
    pub id: Uuid,
    pub body: RevokeBody,
}

#[tracing::instrument(skip(state, payload))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RevokeBody>, JsonRejection>,
) -> Result<impl IntoResponse, ShareError> {
    let Json(body) = payload.map_err(|e| ShareError::InvalidRequest(e.body_text()))?;
    state
        .manager()
        .revoke_share(&body.config, &body.bucket, id)
        .await?;
    Ok((http::StatusCode::OK, Json(Ack::ok())))
}

impl ApiRequest for RevokeRequest {
    type Response = Ack;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = super::share_url(base_url, &format!("/{}", self.id));
        client.delete(full_url).json(&self.body)
    }
}
