//! Idea publishing and discovery. Listing, search and detail are public;
//! everything else needs a session.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use billnet_engine::funding::{self, IdeaDraft, IdeaUpdate};
use billnet_engine::{Idea, IdeaId, NotificationKind, PostType};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{page_limit, ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::ideas::{self, SearchFilter};
use crate::db::notifications::{notify, Subject};
use crate::db;
use crate::errors::{ApiError, Result};
use crate::escrow;

#[derive(Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPage {
    pub count: usize,
    pub ideas: Vec<Idea>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub post_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct IdeasResponse {
    pub count: usize,
    pub ideas: Vec<Idea>,
}

fn encode_cursor(id: IdeaId) -> String {
    URL_SAFE_NO_PAD.encode(format!("idea:{id}"))
}

fn decode_cursor(cursor: &str) -> Result<IdeaId> {
    URL_SAFE_NO_PAD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.strip_prefix("idea:").and_then(|id| id.parse().ok()))
        .ok_or_else(|| ApiError::Validation("invalid cursor".to_string()))
}

/// `GET /ideas`
///
/// Active ideas, newest first. `nextCursor` is absent on the last page.
pub async fn list_ideas(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<IdeaPage>> {
    let before = query.cursor.as_deref().map(decode_cursor).transpose()?;
    let limit = page_limit(query.limit, 20, 100);

    let mut conn = state.pool.acquire().await?;
    let mut ideas = ideas::list_active(&mut conn, before, limit + 1).await?;

    let next_cursor = if ideas.len() as i64 > limit {
        ideas.truncate(limit as usize);
        ideas.last().map(|idea| encode_cursor(idea.id))
    } else {
        None
    };
    Ok(Json(IdeaPage {
        count: ideas.len(),
        ideas,
        next_cursor,
    }))
}

/// `GET /ideas/search?q=&category=&postType=`
pub async fn search_ideas(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<IdeasResponse>> {
    let post_type = query
        .post_type
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<PostType>()
                .map_err(|_| ApiError::Validation(format!("unknown postType: {p}")))
        })
        .transpose()?;
    let filter = SearchFilter {
        text: query.q.as_deref(),
        category: query.category.as_deref().filter(|c| !c.trim().is_empty()),
        post_type,
    };

    let mut conn = state.pool.acquire().await?;
    let ideas = ideas::search(&mut conn, &filter, page_limit(query.limit, 50, 100)).await?;
    Ok(Json(IdeasResponse {
        count: ideas.len(),
        ideas,
    }))
}

/// `GET /ideas/my-ideas`
pub async fn my_ideas(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<IdeasResponse>> {
    let mut conn = state.pool.acquire().await?;
    let ideas = ideas::list_by_owner(&mut conn, user.id).await?;
    Ok(Json(IdeasResponse {
        count: ideas.len(),
        ideas,
    }))
}

/// `POST /ideas`
pub async fn create_idea(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(draft): ApiJson<IdeaDraft>,
) -> Result<impl IntoResponse> {
    funding::authorize_publish(&user.caller(), &draft)?;

    let mut tx = state.begin_write().await?;
    let idea = ideas::insert(&mut tx, user.id, &draft, db::now()).await?;
    tx.commit().await?;

    info!(idea_id = idea.id, owner_id = user.id, post_type = %idea.post_type, "idea published");
    Ok((StatusCode::CREATED, Json(idea)))
}

/// `GET /ideas/:id`
pub async fn get_idea(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<IdeaId>,
) -> Result<Json<Idea>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(ideas::load(&mut conn, id).await?))
}

/// `PUT /ideas/:id`
pub async fn update_idea(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<IdeaId>,
    ApiJson(update): ApiJson<IdeaUpdate>,
) -> Result<Json<Idea>> {
    let mut tx = state.begin_write().await?;
    let mut idea = ideas::load(&mut tx, id).await?;
    let previous = idea.clone();

    let now = db::now();
    let reached_goal = funding::apply_update(&user.caller(), &mut idea, update, now)?;
    ideas::save(&mut tx, &idea, &previous).await?;
    if reached_goal {
        notify(
            &mut tx,
            idea.owner_id,
            NotificationKind::IdeaFunded,
            &format!("\"{}\" reached its ${} funding goal", idea.title, idea.funding_goal),
            Subject::idea(idea.id),
            now,
        )
        .await?;
    }
    tx.commit().await?;

    info!(idea_id = idea.id, status = %idea.status, "idea updated");
    Ok(Json(idea))
}

/// `DELETE /ideas/:id`
pub async fn delete_idea(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<IdeaId>,
) -> Result<StatusCode> {
    let mut tx = state.begin_write().await?;
    escrow::delete_idea(&mut tx, &user.caller(), id, db::now()).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /ideas/:id/close`
pub async fn close_idea(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(id): Path<IdeaId>,
) -> Result<Json<Idea>> {
    let mut tx = state.begin_write().await?;
    let idea = escrow::close_idea(&mut tx, &user.caller(), id, db::now()).await?;
    tx.commit().await?;
    Ok(Json(idea))
}
