//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (store, bus, clock, engine)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: response envelope and error mapping

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use bloodbank_infra::EngineConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: EngineConfig) -> Router {
    build_app_with_services(Arc::new(services::build_services(config)))
}

pub fn build_app_with_services(services: Arc<services::AppServices>) -> Router {
    routes::router().layer(ServiceBuilder::new().layer(Extension(services)))
}
