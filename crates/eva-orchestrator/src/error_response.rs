//! Maps `eva_common::AppError` onto an axum response — this binary's half of
//! the typed error taxonomy (spec §7), mirroring `eva-executive`'s
//! `error_response.rs` since each HTTP-framework-owning crate provides its own.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eva_common::AppError;

pub struct HttpError(pub AppError);

impl From<AppError> for HttpError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.envelope())).into_response()
    }
}

pub fn unhandled(err: impl std::fmt::Display) -> HttpError {
    HttpError(AppError::new(eva_common::ErrorCode::UnhandledError, err.to_string()))
}
