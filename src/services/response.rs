//! HTTP response building helpers
//!
//! Every handler answers through these so errors have one JSON shape:
//! `{"error": "..."}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::EngagementError;

/// Body sent for every permission failure
pub const ACCESS_DENIED_MESSAGE: &str = "You do not have access to this resource";

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// 302 to `location`; an unencodable target degrades to a 500
pub fn redirect(location: &str) -> Response<Full<Bytes>> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => internal_error("Invalid redirect target"),
    }
}

pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": message }),
    )
}

pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({ "error": message }),
    )
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

pub fn internal_error(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({ "error": message }),
    )
}

/// Convert an EngagementError to an appropriate HTTP response.
///
/// Infrastructure failures are logged and answered with a generic body.
pub fn error_response(error: EngagementError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        EngagementError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        EngagementError::PermissionDenied(_) => {
            (StatusCode::FORBIDDEN, ACCESS_DENIED_MESSAGE.to_string())
        }
        EngagementError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        EngagementError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        _ => {
            error!(error = %error, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, EngagementError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Like `from_result`, answering 201 on success
pub fn created_from_result<T: Serialize>(
    result: Result<T, EngagementError>,
) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (EngagementError::NotFound("post 1".into()), StatusCode::NOT_FOUND),
            (EngagementError::PermissionDenied("no".into()), StatusCode::FORBIDDEN),
            (EngagementError::InvalidInput("limit".into()), StatusCode::BAD_REQUEST),
            (EngagementError::Conflict("email".into()), StatusCode::CONFLICT),
            (EngagementError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error_response(error).status(), status);
        }
    }

    #[test]
    fn test_redirect_sets_location() {
        let response = redirect("/author/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/author/");
    }
}
