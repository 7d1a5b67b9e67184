use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use warmline_core::error::{self, ApiError};

/// Internal error type that converts to structured API responses.
///
/// Conflict maps to 400, not 409; clients rely on the explicit message.
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Missing/invalid/expired credentials (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
    },
    /// Authenticated but lacking the required capability (403)
    Forbidden {
        message: String,
        docs_hint: Option<String>,
    },
    /// Unknown public id / user id (404)
    NotFound { resource: String },
    /// Self-modification or protected-role mutation (400, explicit message)
    Conflict { message: String },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Conflict { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();
        let status = self.status();

        let api_error = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => ApiError {
                error: error::codes::VALIDATION_FAILED.to_string(),
                message,
                field,
                received,
                request_id,
                docs_hint,
            },
            AppError::Unauthorized { message, docs_hint } => ApiError {
                error: error::codes::UNAUTHORIZED.to_string(),
                message,
                field: None,
                received: None,
                request_id,
                docs_hint,
            },
            AppError::Forbidden { message, docs_hint } => ApiError {
                error: error::codes::FORBIDDEN.to_string(),
                message,
                field: None,
                received: None,
                request_id,
                docs_hint,
            },
            AppError::NotFound { resource } => ApiError {
                error: error::codes::NOT_FOUND.to_string(),
                message: format!("{resource} not found"),
                field: None,
                received: None,
                request_id,
                docs_hint: None,
            },
            AppError::Conflict { message } => ApiError {
                error: error::codes::CONFLICT.to_string(),
                message,
                field: None,
                received: None,
                request_id,
                docs_hint: None,
            },
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                ApiError {
                    error: error::codes::INTERNAL_ERROR.to_string(),
                    message: "An internal error occurred".to_string(),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError {
                    error: error::codes::INTERNAL_ERROR.to_string(),
                    message: "An internal error occurred".to_string(),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                }
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}
