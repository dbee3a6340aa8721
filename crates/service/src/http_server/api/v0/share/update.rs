use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use common::share::{Credentials, Expiry};

use crate::error::ShareError;
use crate::http_server::api::client::ApiRequest;
use crate::manager::Ack;
use crate::ServiceState;

/// Body of `PATCH /api/v0/share/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub bucket: String,
    pub config: Credentials,
    pub expires_at: Expiry,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub id: Uuid,
    pub body: UpdateBody,
}

#[tracing::instrument(skip(state, payload))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ShareError> {
    let Json(body) = payload.map_err(|e| ShareError::InvalidRequest(e.body_text()))?;
    state
        .manager()
        .update_share(&body.config, &body.bucket, id, body.expires_at)
        .await?;
    Ok((http::StatusCode::OK, Json(Ack::ok())))
}

impl ApiRequest for UpdateRequest {
    type Response = Ack;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = super::share_url(base_url, &format!("/{}", self.id));
        client.patch(full_url).json(&self.body)
    }
}
