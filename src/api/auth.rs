//! Registration, login, and JWT auth middleware.
//!
//! - `POST /api/auth/register` creates an account (PBKDF2-hashed password)
//! - `POST /api/auth/login` returns a JWT valid for `JWT_TTL_DAYS`
//! - Protected endpoints require `Authorization: Bearer <jwt>`; the user id
//!   from the token claims is attached to the request as [`AuthUser`]

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::auth_hash;
use crate::store::{NewUser, StoreError};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject: the user id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Authenticated user, extracted from the JWT by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

fn issue_jwt(secret: &str, user_id: Uuid, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, (StatusCode, String)> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Username is required".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            "A valid email is required".to_string(),
        ));
    }
    if req.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let user = state
        .store
        .create_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: auth_hash::hash_password(&req.password),
        })
        .await
        .map_err(|e| match e {
            StoreError::DuplicateEmail(_) => {
                (StatusCode::CONFLICT, "Email already registered".to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;

    tracing::info!(user_id = %user.id, "account created");

    Ok(Json(RegisterResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let user = state
        .store
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Same response whether the email or the password was wrong.
    let user = match user {
        Some(u) if auth_hash::verify_password(&req.password, &u.password_hash) => u,
        _ => {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Login failed. Check email or password".to_string(),
            ))
        }
    };

    let (token, exp) = issue_jwt(
        &state.config.auth.jwt_secret,
        user.id,
        state.config.auth.jwt_ttl_days,
    )
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, &state.config.auth.jwt_secret) {
        Ok(claims) => match Uuid::parse_str(&claims.sub) {
            Ok(id) => {
                req.extensions_mut().insert(AuthUser { id });
                next.run(req).await
            }
            Err(_) => (StatusCode::UNAUTHORIZED, "Invalid token subject").into_response(),
        },
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_roundtrip() {
        let user_id = Uuid::new_v4();
        let (token, exp) = issue_jwt("secret", user_id, 30).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let (token, _) = issue_jwt("secret", Uuid::new_v4(), 30).unwrap();
        assert!(verify_jwt(&token, "other-secret").is_err());
    }
}
