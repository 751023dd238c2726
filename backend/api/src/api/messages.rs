use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use billnet_engine::{NotificationKind, UserId};
use serde::{Deserialize, Serialize};

use super::{required_text, ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::notifications::{notify, Subject};
use crate::db::social::{self, ConversationSummary, Message};
use crate::db::{self, users};
use crate::errors::{ApiError, Result};

const MAX_MESSAGE_CHARS: usize = 5_000;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: UserId,
    pub content: String,
}

#[derive(Serialize)]
pub struct ConversationsResponse {
    pub count: usize,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Serialize)]
pub struct ThreadResponse {
    pub count: usize,
    pub messages: Vec<Message>,
}

/// `POST /messages`
pub async fn send_message(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    if req.recipient_id == user.id {
        return Err(ApiError::Validation(
            "you cannot message yourself".to_string(),
        ));
    }
    let content = required_text("content", &req.content, MAX_MESSAGE_CHARS)?;
    let now = db::now();

    let mut tx = state.begin_write().await?;
    let sender = users::find(&mut tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    users::find(&mut tx, req.recipient_id)
        .await?
        .ok_or(ApiError::NotFound("recipient"))?;

    let message = social::insert_message(&mut tx, user.id, req.recipient_id, &content, now).await?;
    notify(
        &mut tx,
        req.recipient_id,
        NotificationKind::NewMessage,
        &format!("New message from {} {}", sender.first_name, sender.last_name),
        Subject::default(),
        now,
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /messages/conversations`
pub async fn conversations(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<ConversationsResponse>> {
    let mut conn = state.pool.acquire().await?;
    let conversations = social::conversations(&mut conn, user.id).await?;
    Ok(Json(ConversationsResponse {
        count: conversations.len(),
        conversations,
    }))
}

/// `GET /messages/:id` where `id` is the other participant.
///
/// Reading a thread marks the counterparty's messages as read.
pub async fn thread(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(other): Path<UserId>,
) -> Result<Json<ThreadResponse>> {
    let mut tx = state.begin_write().await?;
    users::find(&mut tx, other)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    social::mark_thread_read(&mut tx, user.id, other).await?;
    let messages = social::thread(&mut tx, user.id, other).await?;
    tx.commit().await?;

    Ok(Json(ThreadResponse {
        count: messages.len(),
        messages,
    }))
}
