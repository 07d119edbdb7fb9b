use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::driver::DriverStatus;

/// Failures reported by the persistence collaborators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("version conflict on {0}")]
    VersionConflict(String),

    #[error("{0} is already taken")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("location data is too old: {0}")]
    StaleData(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: DriverStatus, to: DriverStatus },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("dependency failed during {operation}: {source}")]
    Dependency {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("deadline exceeded during {0}")]
    Timeout(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-checkable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::StaleData(_) => "stale_data",
            AppError::InvalidTransition { .. }
            | AppError::Conflict(_)
            | AppError::AlreadyExists(_) => "conflict",
            AppError::PreconditionFailed(_) => "precondition_failed",
            AppError::Dependency { .. } => "dependency",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal",
        }
    }

    /// Concurrent-update conflicts may succeed on a fresh attempt; illegal
    /// transitions never will.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::VersionConflict(what) => {
                AppError::Conflict(format!("concurrent modification of {what}"))
            }
            StoreError::Duplicate(what) => AppError::AlreadyExists(what),
            other => AppError::Dependency {
                operation,
                source: other,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StaleData(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. }
            | AppError::Conflict(_)
            | AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Dependency { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
