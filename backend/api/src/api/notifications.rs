use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{page_limit, ApiState, MessageResponse};
use crate::auth::AuthUser;
use crate::db::notifications::{self, Notification};
use crate::errors::Result;

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub count: usize,
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

/// `GET /notifications`
pub async fn list_notifications(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<NotificationsResponse>> {
    let mut conn = state.pool.acquire().await?;
    let notifications =
        notifications::list(&mut conn, user.id, page_limit(query.limit, 50, 200)).await?;
    Ok(Json(NotificationsResponse {
        count: notifications.len(),
        unread: notifications.iter().filter(|n| !n.is_read).count(),
        notifications,
    }))
}

/// `PUT /notifications/:id/read`
pub async fn mark_read(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.begin_write().await?;
    notifications::mark_read(&mut tx, user.id, id).await?;
    tx.commit().await?;
    Ok(MessageResponse::new("notification marked as read"))
}
