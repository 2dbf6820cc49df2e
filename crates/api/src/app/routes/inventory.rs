use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use bloodbank_core::BloodType;
use bloodbank_infra::{BatchFilter, NewBatch};
use bloodbank_inventory::BatchStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/batches", post(receive_batch).get(list_batches))
        .route("/availability", get(stock_summary))
        .route("/availability/:blood_type", get(availability))
        .route("/sweep", post(sweep_expired))
}

pub async fn receive_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReceiveBatchRequest>,
) -> axum::response::Response {
    let blood_type: BloodType = match errors::parse_field("blood_type", &body.blood_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let batch = match services.engine().receive_batch(NewBatch {
        blood_type,
        quantity: body.quantity,
        expiry_date: body.expiry_date,
        donor_id: body.donor_id,
    }) {
        Ok(b) => b,
        Err(e) => return errors::fulfillment_error_to_response(e),
    };

    tracing::info!(
        batch_id = %batch.id_typed(),
        blood_type = %blood_type,
        quantity = batch.quantity(),
        "batch received"
    );
    errors::json_ok(StatusCode::CREATED, dto::batch_to_json(&batch))
}

pub async fn list_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BatchQuery>,
) -> axum::response::Response {
    let mut filter = BatchFilter::all();
    if let Some(raw) = query.blood_type.as_deref() {
        match errors::parse_field::<BloodType>("blood_type", raw) {
            Ok(bt) => filter = filter.with_blood_type(bt),
            Err(resp) => return resp,
        }
    }
    if let Some(raw) = query.status.as_deref() {
        match errors::parse_field::<BatchStatus>("status", raw) {
            Ok(st) => filter = filter.with_status(st),
            Err(resp) => return resp,
        }
    }

    match services.engine().list_batches(&filter) {
        Ok(batches) => errors::json_ok(
            StatusCode::OK,
            batches.iter().map(dto::batch_to_json).collect::<Vec<_>>(),
        ),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn stock_summary(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine().stock_summary() {
        Ok(levels) => errors::json_ok(StatusCode::OK, levels),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw): Path<String>,
) -> axum::response::Response {
    let blood_type: BloodType = match errors::parse_field("blood_type", &raw) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().compute_availability(blood_type) {
        Ok(units) => errors::json_ok(
            StatusCode::OK,
            json!({ "blood_type": blood_type, "available_units": units }),
        ),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn sweep_expired(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine().sweep_expired() {
        Ok(expired) => {
            if expired > 0 {
                tracing::info!(expired, "expired batches swept");
            }
            errors::json_ok(StatusCode::OK, json!({ "expired": expired }))
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
