//! Comments, favorites, follows and direct messages.

use billnet_engine::{IdeaId, UserId};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use crate::errors::Result;

// ─────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub idea_id: IdeaId,
    pub user_id: UserId,
    pub author_name: String,
    pub content: String,
    pub created_at: i64,
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.idea_id, c.user_id, u.first_name || ' ' || u.last_name AS author_name,
           c.content, c.created_at
    FROM   comments c
    JOIN   users u ON u.id = c.user_id
"#;

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    idea_id: IdeaId,
    user_id: UserId,
    content: &str,
    now: i64,
) -> Result<Comment> {
    let id = sqlx::query(
        "INSERT INTO comments (idea_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(idea_id)
    .bind(user_id)
    .bind(content)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let comment = sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = ?1"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(comment)
}

/// Thread under an idea, oldest first.
pub async fn list_comments(conn: &mut SqliteConnection, idea_id: IdeaId) -> Result<Vec<Comment>> {
    let rows = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.idea_id = ?1 ORDER BY c.id ASC"
    ))
    .bind(idea_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Favorites & follows
// ─────────────────────────────────────────────────────────

/// Flip the favorite flag. Returns `true` when the idea is now a favorite.
pub async fn toggle_favorite(
    conn: &mut SqliteConnection,
    user_id: UserId,
    idea_id: IdeaId,
    now: i64,
) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND idea_id = ?2")
        .bind(user_id)
        .bind(idea_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }
    sqlx::query("INSERT INTO favorites (user_id, idea_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(idea_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

/// Flip the follow edge. Returns `true` when `follower_id` now follows.
pub async fn toggle_follow(
    conn: &mut SqliteConnection,
    follower_id: UserId,
    followee_id: UserId,
    now: i64,
) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2")
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }
    sqlx::query("INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(follower_id)
        .bind(followee_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

// ─────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: i64,
}

pub async fn insert_message(
    conn: &mut SqliteConnection,
    sender_id: UserId,
    recipient_id: UserId,
    content: &str,
    now: i64,
) -> Result<Message> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (sender_id, recipient_id, content, created_at)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, sender_id, recipient_id, content, is_read, created_at
        "#,
    )
    .bind(sender_id)
    .bind(recipient_id)
    .bind(content)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(message)
}

/// Both directions of a conversation, oldest first.
pub async fn thread(
    conn: &mut SqliteConnection,
    me: UserId,
    other: UserId,
) -> Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, sender_id, recipient_id, content, is_read, created_at
        FROM   messages
        WHERE  (sender_id = ?1 AND recipient_id = ?2)
           OR  (sender_id = ?2 AND recipient_id = ?1)
        ORDER  BY id ASC
        "#,
    )
    .bind(me)
    .bind(other)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Mark everything `other` sent to `me` as read.
pub async fn mark_thread_read(conn: &mut SqliteConnection, me: UserId, other: UserId) -> Result<u64> {
    let done = sqlx::query(
        "UPDATE messages SET is_read = 1 WHERE recipient_id = ?1 AND sender_id = ?2 AND is_read = 0",
    )
    .bind(me)
    .bind(other)
    .execute(&mut *conn)
    .await?;
    Ok(done.rows_affected())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub last_message: String,
    pub last_message_at: i64,
    pub unread_count: i64,
}

/// One row per counterparty, most recent conversation first.
pub async fn conversations(
    conn: &mut SqliteConnection,
    me: UserId,
) -> Result<Vec<ConversationSummary>> {
    let rows = sqlx::query_as::<_, ConversationSummary>(
        r#"
        WITH mine AS (
            SELECT CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS other_id,
                   id, content, created_at,
                   CASE WHEN recipient_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END AS unread
            FROM   messages
            WHERE  sender_id = ?1 OR recipient_id = ?1
        )
        SELECT m.other_id AS user_id, u.first_name, u.last_name,
               (SELECT l.content FROM mine l WHERE l.other_id = m.other_id
                ORDER BY l.id DESC LIMIT 1) AS last_message,
               MAX(m.created_at) AS last_message_at,
               SUM(m.unread) AS unread_count
        FROM   mine m
        JOIN   users u ON u.id = m.other_id
        GROUP  BY m.other_id, u.first_name, u.last_name
        ORDER  BY MAX(m.id) DESC
        "#,
    )
    .bind(me)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
