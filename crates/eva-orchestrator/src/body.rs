//! JSON request body guard, mirroring `eva-executive::body` (spec §4.3): reject
//! non-JSON content types with 415, enforce a byte cap with 413 before
//! parsing, return structured `{error:{code,message,extra?}}` on failure.

use axum::http::HeaderMap;
use eva_common::{AppError, ErrorCode};
use serde::de::DeserializeOwned;

fn content_type_is_json(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

pub fn parse_json_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8], max_body_bytes: usize) -> Result<T, AppError> {
    if !content_type_is_json(headers) {
        return Err(AppError::new(ErrorCode::UnsupportedContentType, "expected content-type: application/json"));
    }
    if body.len() > max_body_bytes {
        return Err(AppError::new(ErrorCode::PayloadTooLarge, format!("body of {} bytes exceeds the {max_body_bytes}-byte limit", body.len())));
    }
    if body.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyBody, "request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| AppError::new(ErrorCode::InvalidJson, e.to_string()))
}
