//! Account authentication and password reset.
//!
//! Reset links reuse the stateless HMAC token construction under its own
//! namespace with a 1-hour expiry. Forgot-password always answers with the
//! same message so responses can't be used to enumerate accounts.

use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};

use crate::crypto::{generate_bearer_token, hash_password, hash_secret, verify_password};
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If this email exists in our system, check your inbox for the reset link";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: LoginUser,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let conn = state.db.get()?;

    let user = queries::get_user_by_email(&conn, &body.email)?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

    if !verify_password(&user.password_hash, &body.password)? {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let token = generate_bearer_token();
    queries::set_user_api_token_hash(&conn, &user.id, Some(&hash_secret(&token)))?;

    Ok(Json(LoginResponse {
        success: true,
        token,
        user: LoginUser {
            id: user.id,
            email: user.email,
            name: user.name,
        },
    }))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct ForgotPasswordResponse {
    pub success: bool,
    pub message: &'static str,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_email(&conn, &body.email)?
    };

    if let Some(user) = user {
        let token = state.tokens.issue_reset_token(&user.id);
        let reset_url = format!(
            "{}/reset-password?userId={}&token={}",
            state.base_url, user.id, token
        );

        if let Err(e) = state.email.send_password_reset(&user.email, &reset_url).await {
            tracing::warn!("Failed to send password reset to {}: {}", user.email, e);
        }
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: FORGOT_PASSWORD_MESSAGE,
    }))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct ResetPasswordResponse {
    pub success: bool,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>> {
    if body.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    if let Err(e) = state.tokens.verify_reset_token(&body.user_id, &body.token) {
        tracing::warn!("Reset token rejected for user {}: {}", body.user_id, e);
        return Err(AppError::Unauthorized(e.to_string()));
    }

    let password_hash = hash_password(&body.new_password)?;

    let conn = state.db.get()?;
    // Also invalidates the active bearer token
    if !queries::set_user_password(&conn, &body.user_id, &password_hash)? {
        return Err(AppError::NotFound("Account not found".into()));
    }

    Ok(Json(ResetPasswordResponse { success: true }))
}
