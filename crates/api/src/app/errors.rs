use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use bloodbank_core::DomainError;
use bloodbank_infra::FulfillmentError;

pub fn fulfillment_error_to_response(err: FulfillmentError) -> axum::response::Response {
    match err {
        FulfillmentError::NotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        FulfillmentError::InvalidState(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_state", msg)
        }
        FulfillmentError::InsufficientStock { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_stock", err.to_string())
        }
        FulfillmentError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        FulfillmentError::PersistenceConflict(_) => {
            internal(err, "persistence_conflict", "the request could not be completed; try again")
        }
        FulfillmentError::Store(_) => internal(err, "store_error", "internal error"),
        FulfillmentError::Unexpected(_) => internal(err, "unexpected_error", "internal error"),
    }
}

/// 500 with a generic message; the detail only goes to the log.
fn internal(
    err: FulfillmentError,
    code: &'static str,
    public_message: &'static str,
) -> axum::response::Response {
    tracing::error!(error = %err, code, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, code, public_message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": message.into(),
            "code": code,
        })),
    )
        .into_response()
}

pub fn json_ok(status: StatusCode, data: impl Serialize) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": true,
            "data": data,
        })),
    )
        .into_response()
}

/// Parse a path/query/body value, answering 400 on failure.
pub fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e: DomainError| {
        json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{field}: {e}"),
        )
    })
}
