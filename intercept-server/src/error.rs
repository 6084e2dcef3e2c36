//! HTTP error taxonomy, spec.md §7.
//!
//! Every handler returns `Result<T, ApiError>`; `ApiError`'s `IntoResponse`
//! impl is the one place that turns a typed failure into the
//! `{status:"error", message}` wire shape and the matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use intercept_core::validators::ValidationError;
use serde::Serialize;

use crate::satellite_fetch::FetchError;
use crate::supervisor::SupervisorError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{mode} already running")]
    Conflict { mode: &'static str },

    #[error("required tool missing: {tool} ({install_hint})")]
    DependencyMissing { tool: String, install_hint: String },

    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{mode} is not running")]
    NotRunning { mode: &'static str },

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::DependencyMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::SpawnFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotRunning { .. } => StatusCode::OK,
            ApiError::Supervisor(e) => e.status_code(),
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
