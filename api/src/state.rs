use sqlx::PgPool;

use crate::responder::Responder;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Completion-provider wrapper shared by the chat and letter routes.
    pub responder: Responder,
    /// HS256 signing secret for session tokens.
    pub jwt_secret: String,
}
