use axum::{routing::get, Router};

pub mod inventory;
pub mod requests;
pub mod system;

/// Router for every endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/inventory", inventory::router())
        .nest("/requests", requests::router())
}
