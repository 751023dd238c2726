use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use billnet_engine::{IdeaId, NotificationKind, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{required_text, ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::notifications::{notify, Subject};
use crate::db::social::{self, Comment};
use crate::db::{self, ideas, users};
use crate::errors::{ApiError, Result};

const MAX_COMMENT_CHARS: usize = 2_000;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub idea_id: IdeaId,
    pub content: String,
}

#[derive(Serialize)]
pub struct CommentsResponse {
    pub count: usize,
    pub comments: Vec<Comment>,
}

#[derive(Serialize)]
pub struct FavoriteResponse {
    pub favorited: bool,
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub following: bool,
}

/// `POST /comments`
pub async fn add_comment(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<AddCommentRequest>,
) -> Result<impl IntoResponse> {
    let content = required_text("content", &req.content, MAX_COMMENT_CHARS)?;
    let now = db::now();

    let mut tx = state.begin_write().await?;
    let idea = ideas::load(&mut tx, req.idea_id).await?;
    let comment = social::insert_comment(&mut tx, idea.id, user.id, &content, now).await?;
    if idea.owner_id != user.id {
        notify(
            &mut tx,
            idea.owner_id,
            NotificationKind::NewComment,
            &format!("{} commented on \"{}\"", comment.author_name, idea.title),
            Subject::idea(idea.id),
            now,
        )
        .await?;
    }
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET /comments/:id` where `id` is the idea.
pub async fn list_comments(
    State(state): State<Arc<ApiState>>,
    Path(idea_id): Path<IdeaId>,
) -> Result<Json<CommentsResponse>> {
    let mut conn = state.pool.acquire().await?;
    ideas::load(&mut conn, idea_id).await?;
    let comments = social::list_comments(&mut conn, idea_id).await?;
    Ok(Json(CommentsResponse {
        count: comments.len(),
        comments,
    }))
}

/// `POST /favorites/:id`
pub async fn toggle_favorite(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(idea_id): Path<IdeaId>,
) -> Result<Json<FavoriteResponse>> {
    let mut tx = state.begin_write().await?;
    ideas::load(&mut tx, idea_id).await?;
    let favorited = social::toggle_favorite(&mut tx, user.id, idea_id, db::now()).await?;
    tx.commit().await?;
    Ok(Json(FavoriteResponse { favorited }))
}

/// `POST /follows/:id`
pub async fn toggle_follow(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(followee_id): Path<UserId>,
) -> Result<Json<FollowResponse>> {
    if followee_id == user.id {
        return Err(ApiError::Validation("you cannot follow yourself".to_string()));
    }
    let now = db::now();

    let mut tx = state.begin_write().await?;
    let follower = users::find(&mut tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    users::find(&mut tx, followee_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let following = social::toggle_follow(&mut tx, user.id, followee_id, now).await?;
    if following {
        notify(
            &mut tx,
            followee_id,
            NotificationKind::NewFollower,
            &format!("{} {} started following you", follower.first_name, follower.last_name),
            Subject::default(),
            now,
        )
        .await?;
    }
    tx.commit().await?;

    info!(follower_id = user.id, followee_id, following, "follow toggled");
    Ok(Json(FollowResponse { following }))
}
