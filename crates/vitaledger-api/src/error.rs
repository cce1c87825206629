use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use vitaledger_core::VitaLedgerError;

/// HTTP-facing error, mapped from [`VitaLedgerError`] and request-local
/// validation failures (spec §7).
pub enum ApiError {
    Validation(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }
}

impl From<VitaLedgerError> for ApiError {
    fn from(err: VitaLedgerError) -> Self {
        match err {
            VitaLedgerError::Validation(msg) => ApiError::Validation(msg),
            VitaLedgerError::NotFound(msg) => ApiError::Validation(msg),
            VitaLedgerError::Storage(msg) => ApiError::Internal(msg),
            VitaLedgerError::Serialization(msg) => ApiError::Internal(msg),
            VitaLedgerError::Other(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": message } }))).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(%message, "unhandled internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": { "message": message } }))).into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
