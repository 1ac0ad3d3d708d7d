//! The error taxonomy's HTTP mapping (§7): only three classes ever reach the
//! caller — bad input, upstream unavailability, and total absence.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quire_core::AddressError;
use serde::Serialize;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("not found"))]
    NotFound,
    #[snafu(transparent)]
    BadAddress { source: AddressError },
    #[snafu(display("unsupported kind {kind} for this endpoint"))]
    UnsupportedKind { kind: u32 },
    #[snafu(display("renderer request failed: {reason}"))]
    RenderFailed { reason: String },
    #[snafu(display("upstream request timed out"))]
    UpstreamTimeout,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadAddress { .. } | AppError::UnsupportedKind { .. } => StatusCode::BAD_REQUEST,
            AppError::RenderFailed { .. } | AppError::UpstreamTimeout => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
