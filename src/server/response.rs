//! Response helpers

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, RETRY_AFTER};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::types::GateError;

pub type FullBody = Full<Bytes>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

/// JSON response with the given status
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = match serde_json::to_string(body) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return plain_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error": "Internal serialization error", "code": "INTERNAL_ERROR"}"#,
            );
        }
    };
    let mut response = plain_response(status, json);
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    response
}

/// Error response; rate-limit denials carry `Retry-After`
pub fn error_response(err: &GateError) -> Response<FullBody> {
    let mut response = json_response(
        err.status_code(),
        &ErrorBody {
            error: err.to_string(),
            code: err.code(),
        },
    );
    if let Some(secs) = err.retry_after_secs() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// CORS preflight response
pub fn preflight_response() -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Not found response
pub fn not_found_response(path: &str) -> Response<FullBody> {
    error_response(&GateError::NotFound(path.to_string()))
}

fn plain_response(status: StatusCode, body: impl Into<Bytes>) -> Response<FullBody> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert("Content-Type", HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_limited_has_retry_after() {
        let response = error_response(&GateError::RateLimited {
            retry_after: Duration::from_millis(2500),
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "3");
    }

    #[test]
    fn test_other_errors_have_no_retry_after() {
        let response = error_response(&GateError::Forbidden("nope".into()));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(RETRY_AFTER).is_none());
    }

    #[test]
    fn test_preflight() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
    }
}
