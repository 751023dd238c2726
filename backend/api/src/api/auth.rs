//! Signup, signin, and the one-time-token flows.
//!
//! Outbound email is not wired up; verification and reset links are written
//! to the log instead.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use billnet_engine::Role;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{required_text, ApiJson, ApiState, MessageResponse};
use crate::auth::{create_token, hash_password, new_salt, random_hex, verify_password};
use crate::db::tokens::{self, TokenPurpose};
use crate::db::users::{self, NewUser, User};
use crate::db::{self, wallets};
use crate::errors::{ApiError, Result};

const MIN_PASSWORD_LEN: usize = 8;
const VERIFY_EMAIL_TTL_SECS: i64 = 7 * 24 * 3600;
const RESET_PASSWORD_TTL_SECS: i64 = 3600;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: User,
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !valid || email.len() > 254 {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn session(state: &ApiState, user: User) -> Result<SessionResponse> {
    let token = create_token(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)?;
    Ok(SessionResponse {
        token,
        expires_in: state.config.token_ttl_secs,
        user,
    })
}

/// `POST /auth/signup`
pub async fn signup(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse> {
    let first_name = required_text("firstName", &req.first_name, 100)?;
    let last_name = required_text("lastName", &req.last_name, 100)?;
    let email = normalize_email(&req.email)?;
    check_password(&req.password)?;

    let salt = new_salt();
    let password_hash =
        hash_password(&req.password, &salt, state.config.password_hash_rounds).await?;
    let verify_token = random_hex(32);
    let now = db::now();

    let mut tx = state.begin_write().await?;
    let mut user = users::insert(
        &mut tx,
        &NewUser {
            first_name: &first_name,
            last_name: &last_name,
            email: &email,
            password_hash: &password_hash,
            password_salt: &salt,
        },
        now,
    )
    .await?;
    if state.config.is_admin_email(&user.email) {
        users::set_role(&mut tx, user.id, Role::Admin).await?;
        user.role = Some(Role::Admin);
    }
    wallets::create(&mut tx, user.id).await?;
    tokens::insert(
        &mut tx,
        &verify_token,
        user.id,
        TokenPurpose::VerifyEmail,
        now + VERIFY_EMAIL_TTL_SECS,
    )
    .await?;
    tx.commit().await?;

    info!(user_id = user.id, role = ?user.role, "account created");
    info!(user_id = user.id, "email verification link: /api/auth/verify-email?token={verify_token}");

    Ok((StatusCode::CREATED, Json(session(&state, user)?)))
}

/// `POST /auth/signin`
pub async fn signin(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<Json<SessionResponse>> {
    let email = req.email.trim().to_lowercase();
    let mut conn = state.pool.acquire().await?;
    let credentials = users::find_credentials(&mut conn, &email).await?;
    drop(conn);

    let Some(credentials) = credentials else {
        return Err(ApiError::Unauthorized("invalid email or password"));
    };
    let matches = verify_password(
        &req.password,
        &credentials.password_salt,
        &credentials.password_hash,
    )
    .await?;
    if !matches {
        warn!(user_id = credentials.user.id, "failed sign-in attempt");
        return Err(ApiError::Unauthorized("invalid email or password"));
    }
    Ok(Json(session(&state, credentials.user)?))
}

/// `POST /auth/forgot-password`
///
/// Always answers 200, whether or not the account exists.
pub async fn forgot_password(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let mut tx = state.begin_write().await?;

    if let Some(credentials) = users::find_credentials(&mut tx, &email).await? {
        let token = random_hex(32);
        tokens::insert(
            &mut tx,
            &token,
            credentials.user.id,
            TokenPurpose::ResetPassword,
            db::now() + RESET_PASSWORD_TTL_SECS,
        )
        .await?;
        tx.commit().await?;
        info!(
            user_id = credentials.user.id,
            "password reset token issued: {token}"
        );
    }

    Ok(MessageResponse::new(
        "if the account exists, a reset link has been sent",
    ))
}

/// `POST /auth/reset-password`
pub async fn reset_password(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse> {
    check_password(&req.password)?;
    let salt = new_salt();
    let password_hash =
        hash_password(&req.password, &salt, state.config.password_hash_rounds).await?;

    let mut tx = state.begin_write().await?;
    let user_id = tokens::consume(&mut tx, req.token.trim(), TokenPurpose::ResetPassword, db::now())
        .await?
        .ok_or_else(|| ApiError::Validation("reset token is invalid or expired".to_string()))?;
    users::set_password(&mut tx, user_id, &password_hash, &salt).await?;
    tx.commit().await?;

    info!(user_id, "password reset");
    Ok(MessageResponse::new("password updated"))
}

/// `GET /auth/verify-email?token=`
pub async fn verify_email(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse> {
    let mut tx = state.begin_write().await?;
    let user_id = tokens::consume(&mut tx, query.token.trim(), TokenPurpose::VerifyEmail, db::now())
        .await?
        .ok_or_else(|| {
            ApiError::Validation("verification token is invalid or expired".to_string())
        })?;
    users::mark_email_verified(&mut tx, user_id).await?;
    tx.commit().await?;

    info!(user_id, "email verified");
    Ok(MessageResponse::new("email verified"))
}
