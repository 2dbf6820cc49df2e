use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use bloodbank_core::{BloodType, RequestId};
use bloodbank_infra::{FulfillmentError, NewRequest};
use bloodbank_requests::{Priority, RequestStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_request).get(list_requests))
        .route("/:id", get(get_request))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
        .route("/:id/cancel", post(cancel_request))
}

fn parse_request_id(raw: &str) -> Result<RequestId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id"))
}

pub async fn submit_request(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitRequestRequest>,
) -> axum::response::Response {
    let blood_type: BloodType = match errors::parse_field("blood_type", &body.blood_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let priority: Priority = match body.priority.as_deref() {
        Some(raw) => match errors::parse_field("priority", raw) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        None => Priority::default(),
    };

    match services.engine().submit(NewRequest {
        blood_type,
        quantity: body.quantity,
        priority,
        patient_name: body.patient_name,
        hospital: body.hospital,
        notes: body.notes,
    }) {
        Ok(request) => errors::json_ok(StatusCode::CREATED, dto::request_to_json(&request)),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::RequestQuery>,
) -> axum::response::Response {
    let status: Option<RequestStatus> = match query.status.as_deref() {
        Some(raw) => match errors::parse_field("status", raw) {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
        None => None,
    };

    match services.engine().list_requests(status) {
        Ok(requests) => errors::json_ok(
            StatusCode::OK,
            requests.iter().map(dto::request_to_json).collect::<Vec<_>>(),
        ),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().get_request(request_id) {
        Ok(request) => errors::json_ok(StatusCode::OK, dto::request_to_json(&request)),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn approve_request(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::ApproveRequestRequest>>,
) -> axum::response::Response {
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();

    match services.engine().check_and_approve(request_id, body.processed_by) {
        Ok(approval) => {
            tracing::info!(
                request_id = %request_id,
                blood_type = %approval.request.blood_type(),
                allocated = approval.allocation.allocated_quantity(),
                batches = approval.allocation.deltas.len(),
                "request approved"
            );
            errors::json_ok(StatusCode::OK, dto::approval_to_json(&approval))
        }
        Err(e) => {
            if let FulfillmentError::InsufficientStock { blood_type, available, required } = &e {
                tracing::warn!(
                    request_id = %request_id,
                    blood_type = %blood_type,
                    available,
                    required,
                    "approval refused: insufficient stock"
                );
            }
            errors::fulfillment_error_to_response(e)
        }
    }
}

pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::RejectRequestRequest>>,
) -> axum::response::Response {
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();

    match services.engine().reject(request_id, body.reason, body.processed_by) {
        Ok(request) => {
            tracing::info!(request_id = %request_id, "request rejected");
            errors::json_ok(StatusCode::OK, dto::request_to_json(&request))
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn cancel_request(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequestRequest>>,
) -> axum::response::Response {
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();

    match services.engine().cancel(request_id, body.reason) {
        Ok(request) => {
            tracing::info!(request_id = %request_id, "request cancelled");
            errors::json_ok(StatusCode::OK, dto::request_to_json(&request))
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
