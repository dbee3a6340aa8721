use axum::routing::{patch, post};
use axum::Router;
use url::Url;

use crate::ServiceState;

pub mod manage;
pub mod proxy;
pub mod revoke;
pub mod update;

pub use proxy::ProxyRequest;
pub use revoke::RevokeRequest;
pub use update::UpdateRequest;

const SHARE_PATH: &str = "/api/v0/share";

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(manage::handler))
        .route("/:id", patch(update::handler).delete(revoke::handler))
        .route("/proxy", post(proxy::handler))
        .with_state(state)
}

/// `base_url` with its path replaced by the share API path plus `suffix`.
fn share_url(base_url: &Url, suffix: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(&format!("{}{}", SHARE_PATH, suffix));
    url
}
