//! HTTP response building helpers
//!
//! Consistent JSON bodies and error mapping for all handlers.

use bytes::Bytes;
use hyper::{header, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::error::LedgerError;

fn builder(status: StatusCode) -> hyper::http::response::Builder {
    Response::builder()
        .status(status)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PATCH, DELETE, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "Authorization, Content-Type")
}

fn finish(builder: hyper::http::response::Builder, body: Bytes) -> Response<Full<Bytes>> {
    // Static header names and values only; building cannot fail
    builder
        .body(Full::new(body.clone()))
        .unwrap_or_else(|_| Response::new(Full::new(body)))
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    finish(
        builder(status).header(header::CONTENT_TYPE, "application/json"),
        Bytes::from(json),
    )
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    finish(builder(StatusCode::NO_CONTENT), Bytes::new())
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({ "error": message }))
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Convert a LedgerError to an appropriate HTTP response
///
/// Conflicts carry the current record so the client can merge and resubmit
/// without a second read.
pub fn error_response(error: LedgerError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        LedgerError::Conflict(current) => {
            return json_response(
                StatusCode::CONFLICT,
                &serde_json::json!({ "error": "version conflict", "current": current.view() }),
            );
        }
        LedgerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        LedgerError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        LedgerError::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        LedgerError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        LedgerError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        LedgerError::StorageUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    };

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, LedgerError>;

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, LedgerError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Returns 204 No Content if deleted, 404 Not Found if not found
pub fn from_delete_bool_result(
    result: Result<bool, LedgerError>,
    not_found_msg: &str,
) -> Response<Full<Bytes>> {
    match result {
        Ok(true) => no_content(),
        Ok(false) => not_found(not_found_msg),
        Err(e) => error_response(e),
    }
}
