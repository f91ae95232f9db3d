//! Tagged application error taxonomy.
//!
//! Handlers translate every failure into one of these kinds before it
//! crosses the HTTP boundary; internal messages (storage errors, panics)
//! never leak verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Policy { message: String, status: StatusCode },

    #[error("{message}")]
    Conflict { message: String },

    #[error("transient failure: {message}")]
    Transient { message: String },

    #[error("fatal error: {message}")]
    Fatal { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn policy(message: impl Into<String>, status: StatusCode) -> Self {
        AppError::Policy {
            message: message.into(),
            status,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        AppError::Transient {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        AppError::Fatal {
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Policy { message, status } => (*status, message.clone()),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message.clone()),
            AppError::Transient { message } => {
                tracing::warn!(error = %message, "transient failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporarily unavailable".to_string(),
                )
            }
            AppError::Fatal { message } => {
                tracing::error!(error = %message, "fatal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { ok: false, error: message })).into_response()
    }
}

/// Maps an opaque storage failure to a `Transient` app error. Known
/// constraint violations (duplicate share, etc.) should be detected by the
/// caller and mapped to `Conflict` before reaching this fallback.
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::transient(err.to_string())
    }
}
