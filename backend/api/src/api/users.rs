use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use billnet_engine::Role;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{required_text, ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::users::{self, ProfileUpdate, User};
use crate::db::verification::{self, NewRequest, VerificationRequest};
use crate::db;
use crate::errors::{ApiError, Result};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct CompleteProfileRequest {
    pub role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSubmission {
    pub document_type: String,
    pub document_reference: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusResponse {
    pub is_certified: bool,
    pub request: Option<VerificationRequest>,
}

async fn load_user(state: &ApiState, id: i64) -> Result<User> {
    let mut conn = state.pool.acquire().await?;
    users::find(&mut conn, id).await?.ok_or(ApiError::NotFound("user"))
}

/// `GET /user/profile`
pub async fn get_profile(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<User>> {
    Ok(Json(load_user(&state, user.id).await?))
}

/// `PUT /user/profile`
pub async fn update_profile(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let first_name = req
        .first_name
        .as_deref()
        .map(|v| required_text("firstName", v, 100))
        .transpose()?;
    let last_name = req
        .last_name
        .as_deref()
        .map(|v| required_text("lastName", v, 100))
        .transpose()?;
    if req.bio.as_ref().is_some_and(|b| b.chars().count() > 2_000) {
        return Err(ApiError::Validation(
            "bio must be at most 2000 characters".to_string(),
        ));
    }
    let bio = req.bio.as_deref().map(str::trim);
    let location = req.location.as_deref().map(str::trim);

    {
        let mut tx = state.begin_write().await?;
        users::update_profile(
            &mut tx,
            user.id,
            &ProfileUpdate {
                first_name: first_name.as_deref(),
                last_name: last_name.as_deref(),
                bio,
                location,
            },
        )
        .await?;
        tx.commit().await?;
    }
    Ok(Json(load_user(&state, user.id).await?))
}

/// `POST /user/complete-profile`
///
/// Onboarding picks the marketplace role once; `admin` cannot be self-assigned.
pub async fn complete_profile(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CompleteProfileRequest>,
) -> Result<Json<User>> {
    if req.role == Role::Admin {
        return Err(ApiError::Validation(
            "role must be entrepreneur or investor".to_string(),
        ));
    }
    {
        let mut tx = state.begin_write().await?;
        users::set_role(&mut tx, user.id, req.role).await?;
        tx.commit().await?;
    }
    info!(user_id = user.id, role = %req.role, "profile completed");
    Ok(Json(load_user(&state, user.id).await?))
}

/// `GET /user/verification/status`
pub async fn verification_status(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<VerificationStatusResponse>> {
    let mut conn = state.pool.acquire().await?;
    let account = users::find(&mut conn, user.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let request = verification::latest_for_user(&mut conn, user.id).await?;
    Ok(Json(VerificationStatusResponse {
        is_certified: account.is_certified,
        request,
    }))
}

/// `POST /user/verification/request`
pub async fn request_verification(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<VerificationSubmission>,
) -> Result<impl IntoResponse> {
    let document_type = required_text("documentType", &req.document_type, 100)?;
    let document_reference = required_text("documentReference", &req.document_reference, 500)?;
    if req.note.chars().count() > 2_000 {
        return Err(ApiError::Validation(
            "note must be at most 2000 characters".to_string(),
        ));
    }

    let mut tx = state.begin_write().await?;
    let request = verification::insert(
        &mut tx,
        user.id,
        &NewRequest {
            document_type: &document_type,
            document_reference: &document_reference,
            note: req.note.trim(),
        },
        db::now(),
    )
    .await?;
    tx.commit().await?;

    info!(user_id = user.id, request_id = request.id, "verification requested");
    Ok((StatusCode::CREATED, Json(request)))
}
