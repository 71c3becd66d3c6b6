//! JSON request body guard (spec §4.3): "all JSON endpoints reject non-JSON
//! content types with 415, enforce `maxBodyBytes` with 413 before parsing, and
//! return structured `{error:{code,message,extra?}}`." Handlers take the raw
//! body as `axum::body::Bytes` (rather than axum's `Json` extractor) precisely
//! so the size check runs before any parsing is attempted.

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

/// Validate content-type and size, then parse `body` as `T`. Returns the
/// matching `AppError` (415 / 413 / 400 `EMPTY_BODY` / 400 `INVALID_JSON`) on
/// failure.
pub fn parse_json_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8], max_body_bytes: usize) -> Result<T, AppError> {
    if !content_type_is_json(headers) {
        return Err(AppError::new(
            ErrorCode::UnsupportedContentType,
            "expected content-type: application/json",
        ));
    }
    if body.len() > max_body_bytes {
        return Err(AppError::new(
            ErrorCode::PayloadTooLarge,
            format!("body of {} bytes exceeds the {max_body_bytes}-byte limit", body.len()),
        ));
    }
    if body.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyBody, "request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| AppError::new(ErrorCode::InvalidJson, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        x: i64,
    }

    fn json_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h
    }

    #[test]
    fn rejects_non_json_content_type() {
        let err = parse_json_body::<Payload>(&HeaderMap::new(), b"{}", 1024).unwrap_err();
        assert_eq!(err.code_str, "UNSUPPORTED_CONTENT_TYPE");
    }

    #[test]
    fn rejects_oversized_body_before_parsing() {
        let err = parse_json_body::<Payload>(&json_headers(), b"{\"x\":1}", 3).unwrap_err();
        assert_eq!(err.code_str, "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn rejects_empty_body() {
        let err = parse_json_body::<Payload>(&json_headers(), b"", 1024).unwrap_err();
        assert_eq!(err.code_str, "EMPTY_BODY");
    }

    #[test]
    fn parses_valid_body() {
        let parsed: Payload = parse_json_body(&json_headers(), b"{\"x\":7}", 1024).unwrap();
        assert_eq!(parsed.x, 7);
    }
}
