//! One-time tokens for email verification and password reset.

use billnet_engine::{text_enum, UserId};
use sqlx::SqliteConnection;

use crate::errors::Result;

text_enum! {
    pub enum TokenPurpose {
        VerifyEmail => "verify_email",
        ResetPassword => "reset_password",
    }
}

pub async fn insert(
    conn: &mut SqliteConnection,
    token: &str,
    user_id: UserId,
    purpose: TokenPurpose,
    expires_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO auth_tokens (token, user_id, purpose, expires_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(token)
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(expires_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete a live token and return its owner. Unknown, expired, or
/// wrong-purpose tokens yield `None`.
pub async fn consume(
    conn: &mut SqliteConnection,
    token: &str,
    purpose: TokenPurpose,
    now: i64,
) -> Result<Option<UserId>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM auth_tokens
        WHERE  token = ?1 AND purpose = ?2 AND expires_at > ?3
        RETURNING user_id
        "#,
    )
    .bind(token)
    .bind(purpose.as_str())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(user_id,)| user_id))
}

pub async fn purge_expired(conn: &mut SqliteConnection, now: i64) -> Result<u64> {
    let done = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?1")
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected())
}
