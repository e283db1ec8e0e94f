//! Unified error handling for the HTTP layer.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::utils::password::PasswordError;

/// Application-level error type. Every handler returns `Result<_, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    BadRequest(String),

    /// Missing/invalid credential, wrong password, unverified account.
    #[error("{0}")]
    Unauthorized(String),

    /// Valid credential without the required capability.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate resource. Rendered as 400 like the other input errors.
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");

            // Internal details only leave the process in debug builds
            let body = if cfg!(debug_assertions) {
                json!({ "success": false, "message": "Internal server error", "error": self.to_string() })
            } else {
                json!({ "success": false, "message": "Internal server error" })
            };
            return HttpResponse::build(status).json(body);
        }

        HttpResponse::build(status).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let message = first_validation_message(&errors)
            .unwrap_or_else(|| "Invalid request body".to_string());
        Self::BadRequest(message)
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        Self::internal(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(format!("failed to sign session credential: {err}"))
    }
}

/// First message in field-name order, descending into nested structs and
/// lists so item-level errors surface too.
fn first_validation_message(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields.into_iter().find_map(|(name, kind)| match kind {
        ValidationErrorsKind::Field(list) => list.first().map(|e| {
            e.message
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("{name} is invalid"))
        }),
        ValidationErrorsKind::Struct(nested) => first_validation_message(nested),
        ValidationErrorsKind::List(items) => items.values().find_map(|e| first_validation_message(e)),
    })
}
