use axum::Router;

pub mod share;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/share", share::router(state.clone()))
        .with_state(state)
}
