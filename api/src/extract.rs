//! Custom extractors that convert axum rejections to structured AppError
//! responses. `AppJson<T>` replaces `axum::Json<T>` in handler signatures
//! so malformed bodies come back as a JSON validation error instead of
//! axum's plain-text 422.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::error::AppError;

pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Convert a `JsonRejection` to a structured `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field = field_from_serde_message(&body_text);

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field.unwrap_or_else(|| "body".to_string())),
        received: None,
        docs_hint: Some(
            "Check the request body against the endpoint schema (GET /api-doc/openapi.json)."
                .to_string(),
        ),
    }
}

/// Pull the offending field name out of serde's "missing field `x`" /
/// "unknown field `x`" messages.
fn field_from_serde_message(msg: &str) -> Option<String> {
    for prefix in ["missing field `", "unknown field `"] {
        if let Some(start) = msg.find(prefix) {
            let after = &msg[start + prefix.len()..];
            if let Some(end) = after.find('`') {
                return Some(after[..end].to_string());
            }
        }
    }
    None
}
