//! Ideas (posts) and their discovery queries.

use billnet_engine::funding::IdeaDraft;
use billnet_engine::{Amount, Equity, Idea, IdeaId, PostType, UserId};
use sqlx::{FromRow, SqliteConnection};

use super::{ensure_updated, parse_tag};
use crate::errors::{ApiError, Result};

#[derive(FromRow)]
struct IdeaRow {
    id: i64,
    user_id: i64,
    title: String,
    description: String,
    category: String,
    post_type: String,
    funding_goal: i64,
    current_funding: i64,
    equity_bps: Option<i64>,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<IdeaRow> for Idea {
    type Error = ApiError;

    fn try_from(row: IdeaRow) -> Result<Self> {
        Ok(Idea {
            id: row.id,
            owner_id: row.user_id,
            title: row.title,
            description: row.description,
            category: row.category,
            post_type: parse_tag(&row.post_type)?,
            funding_goal: Amount::from_cents(row.funding_goal),
            current_funding: Amount::from_cents(row.current_funding),
            equity_percentage: row.equity_bps.map(equity_from_column).transpose()?,
            status: parse_tag(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn equity_from_column(bps: i64) -> Result<Equity> {
    u32::try_from(bps)
        .map(Equity::from_basis_points)
        .map_err(|_| ApiError::Corrupt(format!("equity out of range: {bps}")))
}

const IDEA_COLUMNS: &str = "id, user_id, title, description, category, post_type, funding_goal, \
                            current_funding, equity_bps, status, created_at, updated_at";

pub async fn insert(
    conn: &mut SqliteConnection,
    owner_id: UserId,
    draft: &IdeaDraft,
    now: i64,
) -> Result<Idea> {
    let id = sqlx::query(
        r#"
        INSERT INTO ideas
            (user_id, title, description, category, post_type, funding_goal,
             current_funding, equity_bps, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, 'active', ?8, ?8)
        "#,
    )
    .bind(owner_id)
    .bind(draft.title.trim())
    .bind(&draft.description)
    .bind(draft.category.trim())
    .bind(draft.post_type.as_str())
    .bind(draft.funding_goal.cents())
    .bind(draft.equity_percentage.map(|e| i64::from(e.basis_points())))
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    load(conn, id).await
}

pub async fn find(conn: &mut SqliteConnection, id: IdeaId) -> Result<Option<Idea>> {
    let row = sqlx::query_as::<_, IdeaRow>(&format!(
        "SELECT {IDEA_COLUMNS} FROM ideas WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Idea::try_from).transpose()
}

pub async fn load(conn: &mut SqliteConnection, id: IdeaId) -> Result<Idea> {
    find(conn, id).await?.ok_or(ApiError::NotFound("idea"))
}

/// Persist an engine-mutated idea. Matches only while funding and status
/// are still what `previous` saw.
pub async fn save(conn: &mut SqliteConnection, idea: &Idea, previous: &Idea) -> Result<()> {
    let done = sqlx::query(
        r#"
        UPDATE ideas
        SET    title = ?2, description = ?3, category = ?4, funding_goal = ?5,
               current_funding = ?6, equity_bps = ?7, status = ?8, updated_at = ?9
        WHERE  id = ?1 AND current_funding = ?10 AND status = ?11
        "#,
    )
    .bind(idea.id)
    .bind(&idea.title)
    .bind(&idea.description)
    .bind(&idea.category)
    .bind(idea.funding_goal.cents())
    .bind(idea.current_funding.cents())
    .bind(idea.equity_percentage.map(|e| i64::from(e.basis_points())))
    .bind(idea.status.as_str())
    .bind(idea.updated_at)
    .bind(previous.current_funding.cents())
    .bind(previous.status.as_str())
    .execute(&mut *conn)
    .await?;
    ensure_updated(done.rows_affected(), "idea")
}

pub async fn delete(conn: &mut SqliteConnection, id: IdeaId) -> Result<()> {
    let done = sqlx::query("DELETE FROM ideas WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    ensure_updated(done.rows_affected(), "idea")
}

/// Active ideas, newest first, strictly older than `before` when given.
pub async fn list_active(
    conn: &mut SqliteConnection,
    before: Option<IdeaId>,
    limit: i64,
) -> Result<Vec<Idea>> {
    let rows = sqlx::query_as::<_, IdeaRow>(&format!(
        r#"
        SELECT {IDEA_COLUMNS}
        FROM   ideas
        WHERE  status = 'active' AND (?1 IS NULL OR id < ?1)
        ORDER  BY id DESC
        LIMIT  ?2
        "#
    ))
    .bind(before)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Idea::try_from).collect()
}

pub async fn list_by_owner(conn: &mut SqliteConnection, owner_id: UserId) -> Result<Vec<Idea>> {
    let rows = sqlx::query_as::<_, IdeaRow>(&format!(
        "SELECT {IDEA_COLUMNS} FROM ideas WHERE user_id = ?1 ORDER BY id DESC"
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Idea::try_from).collect()
}

#[derive(Debug, Default)]
pub struct SearchFilter<'a> {
    pub text: Option<&'a str>,
    pub category: Option<&'a str>,
    pub post_type: Option<PostType>,
}

/// Discovery over ideas that are not closed.
pub async fn search(
    conn: &mut SqliteConnection,
    filter: &SearchFilter<'_>,
    limit: i64,
) -> Result<Vec<Idea>> {
    let pattern = filter
        .text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", escape_like(t)));

    let rows = sqlx::query_as::<_, IdeaRow>(&format!(
        r#"
        SELECT {IDEA_COLUMNS}
        FROM   ideas
        WHERE  status != 'closed'
          AND  (?1 IS NULL OR title LIKE ?1 ESCAPE '\' OR description LIKE ?1 ESCAPE '\')
          AND  (?2 IS NULL OR category = ?2 COLLATE NOCASE)
          AND  (?3 IS NULL OR post_type = ?3)
        ORDER  BY id DESC
        LIMIT  ?4
        "#
    ))
    .bind(pattern)
    .bind(filter.category)
    .bind(filter.post_type.map(|p| p.as_str()))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Idea::try_from).collect()
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
