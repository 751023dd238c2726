use billnet_engine::{BidId, IdeaId, NotificationKind, UserId};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::parse_tag;
use crate::errors::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub idea_id: Option<IdeaId>,
    pub bid_id: Option<BidId>,
    pub is_read: bool,
    pub created_at: i64,
}

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    kind: String,
    message: String,
    idea_id: Option<i64>,
    bid_id: Option<i64>,
    is_read: bool,
    created_at: i64,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ApiError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: parse_tag(&row.kind)?,
            message: row.message,
            idea_id: row.idea_id,
            bid_id: row.bid_id,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subject {
    pub idea_id: Option<IdeaId>,
    pub bid_id: Option<BidId>,
}

impl Subject {
    pub fn bid(idea_id: IdeaId, bid_id: BidId) -> Self {
        Self {
            idea_id: Some(idea_id),
            bid_id: Some(bid_id),
        }
    }

    pub fn idea(idea_id: IdeaId) -> Self {
        Self {
            idea_id: Some(idea_id),
            bid_id: None,
        }
    }
}

pub async fn notify(
    conn: &mut SqliteConnection,
    user_id: UserId,
    kind: NotificationKind,
    message: &str,
    subject: Subject,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, message, idea_id, bid_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(message)
    .bind(subject.idea_id)
    .bind(subject.bid_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Newest first.
pub async fn list(conn: &mut SqliteConnection, user_id: UserId, limit: i64) -> Result<Vec<Notification>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, user_id, kind, message, idea_id, bid_id, is_read, created_at
        FROM   notifications
        WHERE  user_id = ?1
        ORDER  BY id DESC
        LIMIT  ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Notification::try_from).collect()
}

/// Mark one of the user's notifications read. Someone else's id is a 404.
pub async fn mark_read(conn: &mut SqliteConnection, user_id: UserId, id: i64) -> Result<()> {
    let done = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if done.rows_affected() == 0 {
        return Err(ApiError::NotFound("notification"));
    }
    Ok(())
}
