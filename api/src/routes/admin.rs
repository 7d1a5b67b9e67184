use axum::extract::{Path, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warmline_core::auth::is_public_id;
use warmline_core::roles::{Identity, Role};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::routes::auth::UserView;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/letters/{public_id}", delete(delete_letter))
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/{user_id}/role", put(update_role))
        .route("/v1/admin/users/{user_id}", delete(delete_user))
}

fn admin_required() -> AppError {
    AppError::Forbidden {
        message: "Admin access required".to_string(),
        docs_hint: None,
    }
}

fn ultimate_admin_required() -> AppError {
    AppError::Forbidden {
        message: "Ultimate admin access required".to_string(),
        docs_hint: Some("User management is restricted to the ultimate admin.".to_string()),
    }
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

async fn fetch_user(pool: &sqlx::PgPool, user_id: Uuid) -> Result<Option<UserRow>, AppError> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, email, display_name, role, is_volunteer, created_at \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Database)
}

// ──────────────────────────────────────────────
// DELETE /v1/admin/letters/{public_id}
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeleteLetterResponse {
    pub success: bool,
    pub letter_id: String,
}

#[utoipa::path(
    delete,
    path = "/v1/admin/letters/{public_id}",
    params(("public_id" = String, Path, description = "Public letter id")),
    responses(
        (status = 200, description = "Letter and its responses removed", body = DeleteLetterResponse),
        (status = 401, description = "Not authenticated", body = warmline_core::error::ApiError),
        (status = 403, description = "Admin access required", body = warmline_core::error::ApiError),
        (status = 404, description = "No such letter", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_letter(
    State(state): State<AppState>,
    identity: Identity,
    Path(public_id): Path<String>,
) -> Result<Json<DeleteLetterResponse>, AppError> {
    if !identity.has_admin_access() {
        return Err(admin_required());
    }

    let not_found = || AppError::NotFound {
        resource: "letter".to_string(),
    };
    if !is_public_id(&public_id) {
        return Err(not_found());
    }
    let letter = store::get_letter_by_public_id(&state.db, &public_id)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(not_found)?;

    store::delete_letter(&state.db, letter.id)
        .await
        .map_err(AppError::Database)?;

    tracing::info!(
        admin_id = %identity.id,
        letter_id = %letter.public_id,
        was_flagged = letter.is_flagged,
        "Letter deleted by admin"
    );

    Ok(Json(DeleteLetterResponse {
        success: true,
        letter_id: letter.public_id,
    }))
}

// ──────────────────────────────────────────────
// GET /v1/admin/users
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UsersResponse {
    pub users: Vec<UserView>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    responses(
        (status = 200, description = "All registered users", body = UsersResponse),
        (status = 401, description = "Not authenticated", body = warmline_core::error::ApiError),
        (status = 403, description = "Ultimate admin access required", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UsersResponse>, AppError> {
    if !identity.can_manage_users() {
        return Err(ultimate_admin_required());
    }

    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, display_name, role, is_volunteer, created_at \
         FROM users ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(AppError::Database)?;

    let users: Vec<UserView> = rows.into_iter().map(UserRow::into_view).collect();

    Ok(Json(UsersResponse {
        count: users.len(),
        users,
    }))
}

// ──────────────────────────────────────────────
// PUT /v1/admin/users/{user_id}/role
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/role",
    params(("user_id" = Uuid, Path, description = "User to update")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserView),
        (status = 400, description = "Invalid role or protected target", body = warmline_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = warmline_core::error::ApiError),
        (status = 403, description = "Ultimate admin access required", body = warmline_core::error::ApiError),
        (status = 404, description = "User not found", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(user_id): Path<Uuid>,
    AppJson(req): AppJson<UpdateRoleRequest>,
) -> Result<Json<UserView>, AppError> {
    if !identity.can_manage_users() {
        return Err(ultimate_admin_required());
    }

    let new_role = Role::parse_strict(&req.role).ok_or_else(|| AppError::Validation {
        message: format!("'{}' is not a valid role", req.role),
        field: Some("role".to_string()),
        received: Some(serde_json::Value::String(req.role.clone())),
        docs_hint: Some("Valid roles: user, admin.".to_string()),
    })?;
    if new_role == Role::UltimateAdmin {
        return Err(AppError::Conflict {
            message: "The ultimate admin role cannot be assigned".to_string(),
        });
    }

    let target = fetch_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("User {}", user_id),
        })?;

    if target.id == identity.id {
        return Err(AppError::Conflict {
            message: "You cannot change your own role".to_string(),
        });
    }
    if Role::parse(&target.role) == Role::UltimateAdmin {
        return Err(AppError::Conflict {
            message: "The ultimate admin cannot be demoted".to_string(),
        });
    }

    sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(target.id)
        .bind(new_role.as_str())
        .execute(&state.db)
        .await
        .map_err(AppError::Database)?;

    tracing::info!(
        admin_id = %identity.id,
        user_id = %target.id,
        old_role = %target.role,
        new_role = new_role.as_str(),
        "User role updated"
    );

    let updated = fetch_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("User {}", user_id),
        })?;

    Ok(Json(updated.into_view()))
}

// ──────────────────────────────────────────────
// DELETE /v1/admin/users/{user_id}
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub user_id: Uuid,
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User to delete")),
    responses(
        (status = 200, description = "User removed; their replies stay, unattributed", body = DeleteUserResponse),
        (status = 400, description = "Protected target", body = warmline_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = warmline_core::error::ApiError),
        (status = 403, description = "Ultimate admin access required", body = warmline_core::error::ApiError),
        (status = 404, description = "User not found", body = warmline_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    if !identity.can_manage_users() {
        return Err(ultimate_admin_required());
    }

    let target = fetch_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("User {}", user_id),
        })?;

    if target.id == identity.id {
        return Err(AppError::Conflict {
            message: "You cannot delete your own account".to_string(),
        });
    }
    if Role::parse(&target.role) == Role::UltimateAdmin {
        return Err(AppError::Conflict {
            message: "The ultimate admin cannot be deleted".to_string(),
        });
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(target.id)
        .execute(&state.db)
        .await
        .map_err(AppError::Database)?;

    tracing::info!(
        admin_id = %identity.id,
        deleted_user_id = %target.id,
        "User account deleted"
    );

    Ok(Json(DeleteUserResponse {
        success: true,
        user_id: target.id,
    }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use warmline_core::letters::{LetterSource, ReplyMethod};
    use warmline_core::roles::{Identity, Role};

    use super::UpdateRoleRequest;
    use crate::error::AppError;
    use crate::extract::AppJson;
    use crate::responder::Responder;
    use crate::state::AppState;
    use crate::store;

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

    async fn test_user(pool: &sqlx::PgPool, role: Role) -> Identity {
        let id = Uuid::now_v7();
        let email = format!("admin-test-{id}@example.org");
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'x', $3)",
        )
        .bind(id)
        .bind(&email)
        .bind(role.as_str())
        .execute(pool)
        .await
        .expect("test user should insert");

        Identity {
            id,
            email,
            role,
            is_volunteer: true,
        }
    }

    #[tokio::test]
    async fn role_changes_are_ultimate_admin_only() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let plain_admin = test_user(&pool, Role::Admin).await;
        let target = test_user(&pool, Role::User).await;

        let err = super::update_role(
            State(state),
            plain_admin,
            Path(target.id),
            AppJson(UpdateRoleRequest {
                role: "admin".to_string(),
            }),
        )
        .await
        .err()
        .expect("plain admins must not manage users");
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn promoting_a_user_to_admin_works() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let ultimate = test_user(&pool, Role::UltimateAdmin).await;
        let target = test_user(&pool, Role::User).await;

        let updated = super::update_role(
            State(state),
            ultimate,
            Path(target.id),
            AppJson(UpdateRoleRequest {
                role: "admin".to_string(),
            }),
        )
        .await
        .expect("promotion should succeed");
        assert_eq!(updated.0.role, Role::Admin);
        assert_eq!(updated.0.id, target.id);
    }

    #[tokio::test]
    async fn self_and_ultimate_targets_are_conflicts() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let ultimate = test_user(&pool, Role::UltimateAdmin).await;
        let other_ultimate = test_user(&pool, Role::UltimateAdmin).await;

        let err = super::update_role(
            State(state.clone()),
            ultimate.clone(),
            Path(ultimate.id),
            AppJson(UpdateRoleRequest {
                role: "user".to_string(),
            }),
        )
        .await
        .err()
        .expect("self-demotion must fail");
        assert!(matches!(err, AppError::Conflict { .. }));

        let err = super::update_role(
            State(state.clone()),
            ultimate.clone(),
            Path(other_ultimate.id),
            AppJson(UpdateRoleRequest {
                role: "user".to_string(),
            }),
        )
        .await
        .err()
        .expect("demoting an ultimate admin must fail");
        assert!(matches!(err, AppError::Conflict { .. }));

        let err = super::delete_user(State(state.clone()), ultimate.clone(), Path(ultimate.id))
            .await
            .err()
            .expect("self-deletion must fail");
        assert!(matches!(err, AppError::Conflict { .. }));

        let target = test_user(&pool, Role::User).await;
        let err = super::update_role(
            State(state),
            ultimate,
            Path(target.id),
            AppJson(UpdateRoleRequest {
                role: "ultimate_admin".to_string(),
            }),
        )
        .await
        .err()
        .expect("granting ultimate admin must fail");
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn unknown_roles_are_a_validation_error() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let ultimate = test_user(&pool, Role::UltimateAdmin).await;
        let target = test_user(&pool, Role::User).await;

        let err = super::update_role(
            State(state),
            ultimate,
            Path(target.id),
            AppJson(UpdateRoleRequest {
                role: "moderator".to_string(),
            }),
        )
        .await
        .err()
        .expect("unknown role must fail");
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("role")),
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn deleting_a_user_keeps_their_replies_unattributed() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let ultimate = test_user(&pool, Role::UltimateAdmin).await;
        let volunteer = test_user(&pool, Role::User).await;

        let letter = store::create_letter(
            &pool,
            store::NewLetter {
                topic: None,
                content: "A letter answered by a volunteer who later leaves.".to_string(),
                reply_method: ReplyMethod::Website,
                anonymous_email: None,
                is_flagged: false,
                source: LetterSource::Online,
            },
        )
        .await
        .expect("insert");
        store::add_response(
            &pool,
            store::NewResponse {
                letter_id: letter.id,
                content: "Wishing you well.".to_string(),
                kind: warmline_core::letters::ResponseKind::Human,
                ai_model: None,
                responder_id: Some(volunteer.id),
            },
        )
        .await
        .expect("response should insert");

        let deleted = super::delete_user(State(state), ultimate, Path(volunteer.id))
            .await
            .expect("deletion should succeed");
        assert!(deleted.0.success);

        let responses = store::list_responses(&pool, letter.id).await.expect("list");
        assert_eq!(responses.len(), 1, "the reply must survive the account");
        assert!(responses[0].responder_id.is_none());
    }

    #[tokio::test]
    async fn admins_can_delete_letters_and_non_admins_cannot() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let admin = test_user(&pool, Role::Admin).await;
        let outsider = test_user(&pool, Role::User).await;

        let letter = store::create_letter(
            &pool,
            store::NewLetter {
                topic: None,
                content: "Spam content that should be removed entirely.".to_string(),
                reply_method: ReplyMethod::Website,
                anonymous_email: None,
                is_flagged: true,
                source: LetterSource::Online,
            },
        )
        .await
        .expect("insert");

        let err = super::delete_letter(
            State(state.clone()),
            outsider,
            Path(letter.public_id.clone()),
        )
        .await
        .err()
        .expect("non-admin deletion must fail");
        assert!(matches!(err, AppError::Forbidden { .. }));

        let deleted = super::delete_letter(
            State(state.clone()),
            admin.clone(),
            Path(letter.public_id.clone()),
        )
        .await
        .expect("admin deletion should succeed");
        assert!(deleted.0.success);

        let err = super::delete_letter(State(state), admin, Path(letter.public_id.clone()))
            .await
            .err()
            .expect("deleting twice must 404");
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn listing_users_requires_the_ultimate_admin() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = test_state(pool.clone());
        let admin = test_user(&pool, Role::Admin).await;
        let ultimate = test_user(&pool, Role::UltimateAdmin).await;

        let err = super::list_users(State(state.clone()), admin)
            .await
            .err()
            .expect("plain admins must not list users");
        assert!(matches!(err, AppError::Forbidden { .. }));

        let listing = super::list_users(State(state), ultimate.clone())
            .await
            .expect("listing should succeed");
        assert!(listing.0.users.iter().any(|u| u.id == ultimate.id));
        assert_eq!(listing.0.count, listing.0.users.len());
    }
}
