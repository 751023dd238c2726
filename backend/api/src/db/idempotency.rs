//! Stored responses for requests that carried an `Idempotency-Key`.

use billnet_engine::UserId;
use sqlx::{FromRow, SqliteConnection};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IdempotencyRecord {
    pub fingerprint: String,
    pub status_code: i64,
    pub response_body: String,
}

/// A record for `(user_id, key)` created at or after `not_before`.
pub async fn find(
    conn: &mut SqliteConnection,
    user_id: UserId,
    key: &str,
    not_before: i64,
) -> Result<Option<IdempotencyRecord>> {
    let record = sqlx::query_as::<_, IdempotencyRecord>(
        r#"
        SELECT fingerprint, status_code, response_body
        FROM   idempotency_keys
        WHERE  user_id = ?1 AND key = ?2 AND created_at >= ?3
        "#,
    )
    .bind(user_id)
    .bind(key)
    .bind(not_before)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

/// Store a response. An expired record under the same key is replaced.
pub async fn store(
    conn: &mut SqliteConnection,
    user_id: UserId,
    key: &str,
    record: &IdempotencyRecord,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO idempotency_keys
            (user_id, key, fingerprint, status_code, response_body, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(user_id)
    .bind(key)
    .bind(&record.fingerprint)
    .bind(record.status_code)
    .bind(&record.response_body)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn purge_older_than(conn: &mut SqliteConnection, cutoff: i64) -> Result<u64> {
    let done = sqlx::query("DELETE FROM idempotency_keys WHERE created_at < ?1")
        .bind(cutoff)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected())
}
