use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode};
use serde_json::json;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::json_ok(
        StatusCode::OK,
        json!({
            "status": "ok",
            "unpublished_events": services.engine().publish_failures(),
        }),
    )
}
