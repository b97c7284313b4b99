use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::dto::auth_dto::{AuthResponse, LoginRequest, SignupRequest, UserOut};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::utils::security;
use crate::AppState;

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<AuthResponse>> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();
    let password_hash = security::hash_password(&req.password)?;

    let user = state.users.create(&email, &password_hash).await?;
    tracing::info!(user_id = user.id, "account created");

    let token = security::create_access_token(user.id, &user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: UserOut::from(user),
    }))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();

    let user = state
        .users
        .by_email(&email)
        .await?
        .ok_or_else(|| Error::BadRequest("Invalid email or password".to_string()))?;
    if !security::verify_password(&req.password, &user.password_hash)? {
        return Err(Error::BadRequest("Invalid email or password".to_string()));
    }

    let token = security::create_access_token(user.id, &user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: UserOut::from(user),
    }))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserOut>> {
    let user_id = claims.user_id()?;
    let user = state
        .users
        .by_id(user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("User not found".to_string()))?;
    Ok(Json(UserOut::from(user)))
}
