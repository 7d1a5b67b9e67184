use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warmline_core::auth;
use warmline_core::roles::{Identity, Role};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn register_router() -> Router<AppState> {
    Router::new().route("/v1/auth/register", post(register))
}

pub fn login_router() -> Router<AppState> {
    Router::new().route("/v1/auth/login", post(login))
}

pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/verify", get(verify))
        .route("/v1/auth/logout", post(logout))
}

/// A user as returned by the API. Password material never leaves the row.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: Role,
    pub is_volunteer: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: Option<String>,
    role: String,
    is_volunteer: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_view(self) -> UserView {
        UserView {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            role: Role::parse(&self.role),
            is_volunteer: self.is_volunteer,
            created_at: self.created_at,
        }
    }
}

// ──────────────────────────────────────────────
// POST /v1/auth/register
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// The first account matching WARMLINE_ULTIMATE_ADMIN_EMAIL becomes the
/// ultimate admin; everyone else starts as a plain user.
fn role_for_new_user(email: &str, configured_admin: Option<&str>) -> Role {
    match configured_admin {
        Some(admin) if admin.eq_ignore_ascii_case(email) => Role::UltimateAdmin,
        _ => Role::User,
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Validation error", body = warmline_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation {
            message: "email must not be empty".to_string(),
            field: Some("email".to_string()),
            received: None,
            docs_hint: None,
        });
    }
    if req.password.len() < 8 {
        return Err(AppError::Validation {
            message: "password must be at least 8 characters".to_string(),
            field: Some("password".to_string()),
            received: None,
            docs_hint: None,
        });
    }

    let password_hash = auth::hash_password(&req.password).map_err(AppError::Internal)?;

    let configured_admin = std::env::var("WARMLINE_ULTIMATE_ADMIN_EMAIL").ok();
    let role = role_for_new_user(&email, configured_admin.as_deref());

    let user_id = Uuid::now_v7();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, display_name, role) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&req.display_name)
    .bind(role.as_str())
    .execute(&state.db)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Validation {
                    message: format!("Email '{}' is already registered", email),
                    field: Some("email".to_string()),
                    received: Some(serde_json::Value::String(email.clone())),
                    docs_hint: Some("Use a different email address.".to_string()),
                };
            }
        }
        AppError::Database(e)
    })?;

    if role == Role::UltimateAdmin {
        tracing::info!(user_id = %user_id, "Registered the ultimate admin account");
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            email,
            role,
        }),
    ))
}

// ──────────────────────────────────────────────
// POST /v1/auth/login
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    role: String,
    is_volunteer: bool,
    created_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = warmline_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized {
        message: "Invalid email or password".to_string(),
        docs_hint: None,
    };

    let email = req.email.trim().to_lowercase();
    let row = sqlx::query_as::<_, LoginRow>(
        "SELECT id, email, password_hash, display_name, role, is_volunteer, created_at \
         FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(invalid)?;

    let verified = auth::verify_password(&req.password, &row.password_hash)
        .map_err(AppError::Internal)?;
    if !verified {
        return Err(invalid());
    }

    let role = Role::parse(&row.role);
    let issued = crate::auth::sign_token(row.id, &row.email, role, &state.jwt_secret)?;
    crate::auth::insert_session(&state.db, &issued, row.id).await?;

    tracing::info!(user_id = %row.id, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.expires_at,
        user: UserView {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            role,
            is_volunteer: row.is_volunteer,
            created_at: row.created_at,
        },
    }))
}

// ──────────────────────────────────────────────
// GET /v1/auth/verify
// ──────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/v1/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = UserView),
        (status = 401, description = "Invalid or expired token", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn verify(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserView>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, display_name, role, is_volunteer, created_at \
         FROM users WHERE id = $1",
    )
    .bind(identity.id)
    .fetch_optional(&state.db)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::Unauthorized {
        message: "Session is no longer valid".to_string(),
        docs_hint: Some("The account may have been removed. Sign in again.".to_string()),
    })?;

    Ok(Json(row.into_view()))
}

// ──────────────────────────────────────────────
// POST /v1/auth/logout
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session revoked", body = LogoutResponse),
        (status = 401, description = "Not authenticated", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AppError> {
    let token = crate::auth::extract_bearer(&headers)?;
    crate::auth::revoke_session(&state.db, token).await?;

    tracing::info!(user_id = %identity.id, "User logged out");

    Ok(Json(LogoutResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use warmline_core::roles::Role;

    use super::{LoginRequest, RegisterRequest, role_for_new_user};
    use crate::error::AppError;
    use crate::extract::AppJson;
    use crate::responder::Responder;
    use crate::state::AppState;

    #[test]
    fn only_the_configured_email_becomes_ultimate_admin() {
        assert_eq!(
            role_for_new_user("root@example.org", Some("root@example.org")),
            Role::UltimateAdmin
        );
        assert_eq!(
            role_for_new_user("root@example.org", Some("ROOT@example.org")),
            Role::UltimateAdmin
        );
        assert_eq!(
            role_for_new_user("other@example.org", Some("root@example.org")),
            Role::User
        );
        assert_eq!(role_for_new_user("root@example.org", None), Role::User);
    }

    async fn db_pool_if_available() -> Option<sqlx::PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .ok()
    }

    fn test_state(pool: sqlx::PgPool) -> AppState {
        AppState {
            db: pool,
            responder: Responder::unconfigured(),
            jwt_secret: "test-secret-not-for-production".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trips_the_credentials() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool);
        let email = format!("volunteer-{}@example.org", Uuid::now_v7());

        super::register(
            axum::extract::State(state.clone()),
            AppJson(RegisterRequest {
                email: email.clone(),
                password: "a-long-enough-password".to_string(),
                display_name: Some("Vol".to_string()),
            }),
        )
        .await
        .expect("registration should succeed");

        let login = super::login(
            axum::extract::State(state.clone()),
            AppJson(LoginRequest {
                email: email.clone(),
                password: "a-long-enough-password".to_string(),
            }),
        )
        .await
        .expect("login should succeed");

        assert_eq!(login.0.token_type, "Bearer");
        assert_eq!(login.0.user.email, email);
        assert_eq!(login.0.user.role, Role::User);

        let claims =
            crate::auth::decode_token(&login.0.token, &state.jwt_secret).expect("token decodes");
        assert_eq!(claims.email, email);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_validation_error_on_email() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool);
        let email = format!("dup-{}@example.org", Uuid::now_v7());
        let request = || RegisterRequest {
            email: email.clone(),
            password: "a-long-enough-password".to_string(),
            display_name: None,
        };

        super::register(axum::extract::State(state.clone()), AppJson(request()))
            .await
            .expect("first registration should succeed");

        let err = super::register(axum::extract::State(state.clone()), AppJson(request()))
            .await
            .err()
            .expect("second registration must fail");
        match err {
            AppError::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("email"));
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_with_a_wrong_password_is_unauthorized() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool);
        let email = format!("wrongpw-{}@example.org", Uuid::now_v7());

        super::register(
            axum::extract::State(state.clone()),
            AppJson(RegisterRequest {
                email: email.clone(),
                password: "a-long-enough-password".to_string(),
                display_name: None,
            }),
        )
        .await
        .expect("registration should succeed");

        let err = super::login(
            axum::extract::State(state.clone()),
            AppJson(LoginRequest {
                email,
                password: "not-the-password".to_string(),
            }),
        )
        .await
        .err()
        .expect("login must fail");
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
