//! HTTP helpers for Lambda functions.

use lambda_http::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use serde::Serialize;

use crate::models::ErrorBody;

pub const ALLOWED_ORIGIN: &str = "https://matsuesunsetai.com";

/// CORS headers attached to every response.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", ALLOWED_ORIGIN),
    ("Access-Control-Allow-Credentials", "false"),
    ("Access-Control-Allow-Headers", "Content-Type,Authorization"),
    ("Access-Control-Allow-Methods", "GET,POST,OPTIONS"),
];

fn with_cors(status: u16) -> lambda_http::http::response::Builder {
    CORS_HEADERS
        .iter()
        .fold(Response::builder().status(status), |builder, (name, value)| {
            builder.header(*name, *value)
        })
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    cached_json_response(status, data, None)
}

/// JSON response carrying an optional `Cache-Control` header.
pub fn cached_json_response<T: Serialize>(
    status: u16,
    data: &T,
    cache_control: Option<&str>,
) -> Result<Response<Body>, lambda_http::Error> {
    let mut builder = with_cors(status).header(CONTENT_TYPE, "application/json");
    if let Some(value) = cache_control {
        builder = builder.header(CACHE_CONTROL, value);
    }
    Ok(builder.body(Body::from(serde_json::to_string(data)?))?)
}

/// Empty 200 answer to a CORS preflight.
pub fn options_response() -> Result<Response<Body>, lambda_http::Error> {
    Ok(with_cors(StatusCode::OK.as_u16()).body(Body::Empty)?)
}

/// Card endpoint error body.
pub fn error_response(
    status: u16,
    error_type: &str,
    message: impl Into<String>,
    request_id: &str,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(
        status,
        &ErrorBody {
            error_type: error_type.to_string(),
            message: message.into(),
            request_id: request_id.to_string(),
        },
    )
}
