//! Application error type and its mapping onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::model::attendance::AttendanceError;
use crate::model::leave_request::LeaveError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or semantically invalid input
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The request is valid but contradicts the current state
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }
}

impl From<AttendanceError> for AppError {
    fn from(e: AttendanceError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

impl From<LeaveError> for AppError {
    fn from(e: LeaveError) -> Self {
        match e {
            LeaveError::StartInPast | LeaveError::EndBeforeStart => {
                AppError::Validation(e.to_string())
            }
            LeaveError::Overlap { .. } | LeaveError::NotPending(_) => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AppError::Internal(format!("password hashing failed: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Token(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

/// Maps constraint violations onto client errors: a duplicate key becomes a
/// conflict carrying `msg`, a dangling reference a validation error.
pub fn constraint_error(e: sqlx::Error, msg: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(msg.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::validation("Referenced record does not exist");
        }
    }
    AppError::Database(e)
}
