//! Certification requests reviewed by admins.

use billnet_engine::{text_enum, UserId};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::parse_tag;
use crate::errors::{ApiError, Result};

text_enum! {
    pub enum VerificationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub id: i64,
    pub user_id: UserId,
    pub document_type: String,
    pub document_reference: String,
    pub note: String,
    pub status: VerificationStatus,
    pub reviewer_note: Option<String>,
    pub created_at: i64,
    pub decided_at: Option<i64>,
}

#[derive(FromRow)]
struct VerificationRow {
    id: i64,
    user_id: i64,
    document_type: String,
    document_reference: String,
    note: String,
    status: String,
    reviewer_note: Option<String>,
    created_at: i64,
    decided_at: Option<i64>,
}

impl TryFrom<VerificationRow> for VerificationRequest {
    type Error = ApiError;

    fn try_from(row: VerificationRow) -> Result<Self> {
        Ok(VerificationRequest {
            id: row.id,
            user_id: row.user_id,
            document_type: row.document_type,
            document_reference: row.document_reference,
            note: row.note,
            status: parse_tag(&row.status)?,
            reviewer_note: row.reviewer_note,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

const COLUMNS: &str = "id, user_id, document_type, document_reference, note, status, \
                       reviewer_note, created_at, decided_at";

pub struct NewRequest<'a> {
    pub document_type: &'a str,
    pub document_reference: &'a str,
    pub note: &'a str,
}

/// File a request. Only one request per user may be pending at a time.
pub async fn insert(
    conn: &mut SqliteConnection,
    user_id: UserId,
    new: &NewRequest<'_>,
    now: i64,
) -> Result<VerificationRequest> {
    if let Some(latest) = latest_for_user(conn, user_id).await? {
        if latest.status == VerificationStatus::Pending {
            return Err(ApiError::Conflict(
                "a verification request is already pending".to_string(),
            ));
        }
    }

    let id = sqlx::query(
        r#"
        INSERT INTO verification_requests
            (user_id, document_type, document_reference, note, status, created_at)
        VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
        "#,
    )
    .bind(user_id)
    .bind(new.document_type)
    .bind(new.document_reference)
    .bind(new.note)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    load(conn, id).await
}

pub async fn load(conn: &mut SqliteConnection, id: i64) -> Result<VerificationRequest> {
    let row = sqlx::query_as::<_, VerificationRow>(&format!(
        "SELECT {COLUMNS} FROM verification_requests WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(VerificationRequest::try_from)
        .transpose()?
        .ok_or(ApiError::NotFound("verification request"))
}

pub async fn latest_for_user(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<Option<VerificationRequest>> {
    let row = sqlx::query_as::<_, VerificationRow>(&format!(
        "SELECT {COLUMNS} FROM verification_requests WHERE user_id = ?1 ORDER BY id DESC LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(VerificationRequest::try_from).transpose()
}

/// Record an admin decision on a pending request.
pub async fn decide(
    conn: &mut SqliteConnection,
    id: i64,
    outcome: VerificationStatus,
    reviewer_note: Option<&str>,
    now: i64,
) -> Result<VerificationRequest> {
    if outcome == VerificationStatus::Pending {
        return Err(ApiError::Validation(
            "decision must be approved or rejected".to_string(),
        ));
    }
    let done = sqlx::query(
        r#"
        UPDATE verification_requests
        SET    status = ?2, reviewer_note = ?3, decided_at = ?4
        WHERE  id = ?1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(outcome.as_str())
    .bind(reviewer_note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let request = load(conn, id).await?;
    if done.rows_affected() == 0 {
        return Err(ApiError::Conflict(format!(
            "verification request {id} is already {}",
            request.status
        )));
    }
    Ok(request)
}
