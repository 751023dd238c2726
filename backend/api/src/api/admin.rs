//! Operator routes. Every handler requires the `admin` role.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use billnet_engine::NotificationKind;
use serde::Deserialize;
use tracing::info;

use super::{ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::notifications::{notify, Subject};
use crate::db::payments::Payment;
use crate::db::verification::{self, VerificationRequest, VerificationStatus};
use crate::db::{self, users};
use crate::errors::Result;
use crate::escrow;

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
    pub note: Option<String>,
}

/// `POST /admin/verification/:id/decide`
pub async fn decide_verification(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<DecisionRequest>,
) -> Result<Json<VerificationRequest>> {
    user.require_admin()?;
    let outcome = if req.approve {
        VerificationStatus::Approved
    } else {
        VerificationStatus::Rejected
    };
    let note = req.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let now = db::now();

    let mut tx = state.begin_write().await?;
    let request = verification::decide(&mut tx, id, outcome, note, now).await?;
    if req.approve {
        users::set_certified(&mut tx, request.user_id, true).await?;
    }
    notify(
        &mut tx,
        request.user_id,
        NotificationKind::VerificationDecided,
        &format!("Your verification request was {outcome}"),
        Subject::default(),
        now,
    )
    .await?;
    tx.commit().await?;

    info!(request_id = id, user_id = request.user_id, reviewer_id = user.id, %outcome, "verification decided");
    Ok(Json(request))
}

/// `POST /admin/payments/:id/confirm`
pub async fn confirm_payment(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Payment>> {
    user.require_admin()?;

    let mut tx = state.begin_write().await?;
    let payment = escrow::confirm_payment(&mut tx, id, db::now()).await?;
    tx.commit().await?;
    Ok(Json(payment))
}
