pub mod connector;
pub mod health;
pub mod signature;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// The health probe is public; the connector endpoint authenticates each
/// delivery itself via the signature header, so no bearer middleware sits
/// in front of it.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/connector", post(connector::receive_event))
}
