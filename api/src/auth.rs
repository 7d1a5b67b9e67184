use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warmline_core::auth::hash_token;
use warmline_core::roles::{Identity, Role};

use crate::error::AppError;
use crate::state::AppState;

/// Bearer tokens live for a day; volunteers sign in per shift.
const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims issued at login. The role claim is a snapshot for the
/// client's benefit; authorization always re-reads the live user row.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Session id; one row per issued token
    pub jti: Uuid,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued-at, seconds since epoch
    pub iat: i64,
}

pub struct IssuedToken {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Sign a fresh token for a user. The caller records the matching
/// session row before handing the token out.
pub fn sign_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
) -> Result<IssuedToken, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role: role.as_str().to_string(),
        jti: Uuid::now_v7(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))?;

    Ok(IssuedToken {
        token,
        session_id: claims.jti,
        expires_at,
    })
}

/// Verify signature and expiry, returning the embedded claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized {
            message: "Token has expired".to_string(),
            docs_hint: Some("Sign in again via POST /auth/login.".to_string()),
        },
        _ => AppError::Unauthorized {
            message: "Invalid token".to_string(),
            docs_hint: Some("Obtain a token via POST /auth/login.".to_string()),
        },
    })
}

/// Record a session row for an issued token.
pub async fn insert_session(
    pool: &sqlx::PgPool,
    issued: &IssuedToken,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(issued.session_id)
    .bind(user_id)
    .bind(hash_token(&issued.token))
    .bind(issued.expires_at)
    .execute(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(())
}

/// Revoke the session behind a presented token. Idempotent.
pub async fn revoke_session(pool: &sqlx::PgPool, token: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE sessions SET revoked = TRUE WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

    Ok(())
}

/// Pull the raw token out of the Authorization header.
pub fn extract_bearer(headers: &axum::http::HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
            docs_hint: Some(
                "Include 'Authorization: Bearer <token>'. Obtain a token via POST /auth/login."
                    .to_string(),
            ),
        })?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use Bearer scheme".to_string(),
            docs_hint: Some("Format: 'Authorization: Bearer <token>'".to_string()),
        })
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    user_id: Uuid,
    email: String,
    role: String,
    is_volunteer: bool,
}

/// Resolve a presented token to a live identity: signature and expiry
/// checked first, then one query through sessions into users so the
/// current role (not the one snapshotted into the claims) decides
/// authorization. Nothing is cached between requests.
async fn authenticate(token: &str, state: &AppState) -> Result<Identity, AppError> {
    decode_token(token, &state.jwt_secret)?;

    let row = sqlx::query_as::<_, SessionUserRow>(
        "SELECT u.id AS user_id, u.email, u.role, u.is_volunteer \
         FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token_hash = $1 \
           AND s.revoked = FALSE \
           AND s.expires_at > NOW()",
    )
    .bind(hash_token(token))
    .fetch_optional(&state.db)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::Unauthorized {
        message: "Session is no longer valid".to_string(),
        docs_hint: Some("The session may have been revoked. Sign in again.".to_string()),
    })?;

    Ok(Identity {
        id: row.user_id,
        email: row.email,
        role: Role::parse(&row.role),
        is_volunteer: row.is_volunteer,
    })
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)?;
        authenticate(token, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_token, sign_token};
    use uuid::Uuid;
    use warmline_core::roles::Role;

    const SECRET: &str = "test-secret-not-for-production";

    #[test]
    fn token_round_trips_and_carries_the_claims() {
        let user_id = Uuid::now_v7();
        let issued = sign_token(user_id, "vol@example.org", Role::Admin, SECRET).unwrap();

        let claims = decode_token(&issued.token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "vol@example.org");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.jti, issued.session_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let issued = sign_token(Uuid::now_v7(), "vol@example.org", Role::User, SECRET).unwrap();

        let mut tampered = issued.token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(decode_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issued = sign_token(Uuid::now_v7(), "vol@example.org", Role::User, "other").unwrap();
        assert!(decode_token(&issued.token, SECRET).is_err());
    }
}
