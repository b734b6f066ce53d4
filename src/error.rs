use crate::utils::validation::FieldErrors;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use tracing::error;

/// Request-boundary error. Every handler returns `Result<HttpResponse, ApiError>`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "Validation failed")]
    Validation(FieldErrors),

    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", message)]
    Conflict {
        message: String,
        errors: Option<FieldErrors>,
    },

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            errors: None,
        }
    }

    pub fn conflict_on(message: impl Into<String>, errors: FieldErrors) -> Self {
        ApiError::Conflict {
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// Single field-level validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(errors)
            | ApiError::Conflict {
                errors: Some(errors),
                ..
            } => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({ "message": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::conflict("Record violates a uniqueness constraint")
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::conflict("Record is still referenced by other records")
            }
            _ => {
                error!(error = %e, "Database error");
                ApiError::Internal
            }
        }
    }
}

/// True when the storage layer rejected a write on a UNIQUE constraint.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
