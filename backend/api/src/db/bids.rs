//! Bids and the investments they turn into.

use billnet_engine::bid::{NewBid, NewInvestment};
use billnet_engine::{
    Amount, Bid, BidId, BidStatus, IdeaId, Investment, InvestmentId, UserId,
};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::ideas::equity_from_column;
use super::{ensure_updated, parse_tag};
use crate::errors::{ApiError, Result};

#[derive(FromRow)]
struct BidRow {
    id: i64,
    idea_id: i64,
    investor_id: i64,
    amount: i64,
    equity_bps: i64,
    counter_amount: Option<i64>,
    counter_equity_bps: Option<i64>,
    reserved: i64,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BidRow> for Bid {
    type Error = ApiError;

    fn try_from(row: BidRow) -> Result<Self> {
        Ok(Bid {
            id: row.id,
            idea_id: row.idea_id,
            investor_id: row.investor_id,
            amount: Amount::from_cents(row.amount),
            equity: equity_from_column(row.equity_bps)?,
            counter_amount: row.counter_amount.map(Amount::from_cents),
            counter_equity: row.counter_equity_bps.map(equity_from_column).transpose()?,
            reserved: Amount::from_cents(row.reserved),
            status: parse_tag(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BID_COLUMNS: &str = "b.id, b.idea_id, b.investor_id, b.amount, b.equity_bps, \
                           b.counter_amount, b.counter_equity_bps, b.reserved, b.status, \
                           b.created_at, b.updated_at";

pub async fn insert(conn: &mut SqliteConnection, bid: &NewBid, now: i64) -> Result<Bid> {
    let id = sqlx::query(
        r#"
        INSERT INTO bids
            (idea_id, investor_id, amount, equity_bps, reserved, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)
        "#,
    )
    .bind(bid.idea_id)
    .bind(bid.investor_id)
    .bind(bid.terms.amount.cents())
    .bind(i64::from(bid.terms.equity.basis_points()))
    .bind(bid.reserved.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    load(conn, id).await
}

pub async fn find(conn: &mut SqliteConnection, id: BidId) -> Result<Option<Bid>> {
    let row = sqlx::query_as::<_, BidRow>(&format!(
        "SELECT {BID_COLUMNS} FROM bids b WHERE b.id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Bid::try_from).transpose()
}

pub async fn load(conn: &mut SqliteConnection, id: BidId) -> Result<Bid> {
    find(conn, id).await?.ok_or(ApiError::NotFound("bid"))
}

/// Persist an engine transition. The update only matches while the stored
/// status is still `previous`, so two racing decisions cannot both land.
pub async fn save_transition(
    conn: &mut SqliteConnection,
    bid: &Bid,
    previous: BidStatus,
) -> Result<()> {
    let done = sqlx::query(
        r#"
        UPDATE bids
        SET    status = ?2, reserved = ?3, counter_amount = ?4,
               counter_equity_bps = ?5, updated_at = ?6
        WHERE  id = ?1 AND status = ?7
        "#,
    )
    .bind(bid.id)
    .bind(bid.status.as_str())
    .bind(bid.reserved.cents())
    .bind(bid.counter_amount.map(Amount::cents))
    .bind(bid.counter_equity.map(|e| i64::from(e.basis_points())))
    .bind(bid.updated_at)
    .bind(previous.as_str())
    .execute(&mut *conn)
    .await?;
    ensure_updated(done.rows_affected(), "bid")
}

pub async fn list_for_idea(conn: &mut SqliteConnection, idea_id: IdeaId) -> Result<Vec<Bid>> {
    let rows = sqlx::query_as::<_, BidRow>(&format!(
        "SELECT {BID_COLUMNS} FROM bids b WHERE b.idea_id = ?1 ORDER BY b.id DESC"
    ))
    .bind(idea_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Bid::try_from).collect()
}

/// Pending and countered bids on an idea.
pub async fn list_open_for_idea(conn: &mut SqliteConnection, idea_id: IdeaId) -> Result<Vec<Bid>> {
    let rows = sqlx::query_as::<_, BidRow>(&format!(
        r#"
        SELECT {BID_COLUMNS}
        FROM   bids b
        WHERE  b.idea_id = ?1 AND b.status IN ('pending', 'countered')
        ORDER  BY b.id ASC
        "#
    ))
    .bind(idea_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Bid::try_from).collect()
}

/// A bid together with the title of the idea it targets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidSummary {
    #[serde(flatten)]
    pub bid: Bid,
    pub idea_title: String,
}

pub async fn list_by_investor(
    conn: &mut SqliteConnection,
    investor_id: UserId,
) -> Result<Vec<BidSummary>> {
    #[derive(FromRow)]
    struct Row {
        #[sqlx(flatten)]
        bid: BidRow,
        idea_title: String,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        r#"
        SELECT {BID_COLUMNS}, i.title AS idea_title
        FROM   bids b
        JOIN   ideas i ON i.id = b.idea_id
        WHERE  b.investor_id = ?1
        ORDER  BY b.id DESC
        "#
    ))
    .bind(investor_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(BidSummary {
                bid: Bid::try_from(r.bid)?,
                idea_title: r.idea_title,
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Investments
// ─────────────────────────────────────────────────────────

#[derive(FromRow)]
struct InvestmentRow {
    id: i64,
    idea_id: i64,
    investor_id: i64,
    bid_id: i64,
    amount: i64,
    equity_bps: i64,
    status: String,
    created_at: i64,
}

impl TryFrom<InvestmentRow> for Investment {
    type Error = ApiError;

    fn try_from(row: InvestmentRow) -> Result<Self> {
        Ok(Investment {
            id: row.id,
            idea_id: row.idea_id,
            investor_id: row.investor_id,
            bid_id: row.bid_id,
            amount: Amount::from_cents(row.amount),
            equity: equity_from_column(row.equity_bps)?,
            status: parse_tag(&row.status)?,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_investment(
    conn: &mut SqliteConnection,
    investment: &NewInvestment,
    now: i64,
) -> Result<Investment> {
    let result = sqlx::query(
        r#"
        INSERT INTO investments
            (idea_id, investor_id, bid_id, amount, equity_bps, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(investment.idea_id)
    .bind(investment.investor_id)
    .bind(investment.bid_id)
    .bind(investment.amount.cents())
    .bind(i64::from(investment.equity.basis_points()))
    .bind(investment.status.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await;

    let id: InvestmentId = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::Conflict(format!(
                "bid {} already produced an investment",
                investment.bid_id
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let row = sqlx::query_as::<_, InvestmentRow>(
        r#"
        SELECT id, idea_id, investor_id, bid_id, amount, equity_bps, status, created_at
        FROM   investments
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Investment::try_from(row)
}

pub async fn count_investments(conn: &mut SqliteConnection, idea_id: IdeaId) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM investments WHERE idea_id = ?1")
        .bind(idea_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSummary {
    #[serde(flatten)]
    pub investment: Investment,
    pub idea_title: String,
    pub idea_status: String,
}

/// An investor's portfolio, newest first.
pub async fn list_investments(
    conn: &mut SqliteConnection,
    investor_id: UserId,
) -> Result<Vec<InvestmentSummary>> {
    #[derive(FromRow)]
    struct Row {
        #[sqlx(flatten)]
        investment: InvestmentRow,
        idea_title: String,
        idea_status: String,
    }

    let rows = sqlx::query_as::<_, Row>(
        r#"
        SELECT v.id, v.idea_id, v.investor_id, v.bid_id, v.amount, v.equity_bps,
               v.status, v.created_at, i.title AS idea_title, i.status AS idea_status
        FROM   investments v
        JOIN   ideas i ON i.id = v.idea_id
        WHERE  v.investor_id = ?1
        ORDER  BY v.id DESC
        "#,
    )
    .bind(investor_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(InvestmentSummary {
                investment: Investment::try_from(r.investment)?,
                idea_title: r.idea_title,
                idea_status: r.idea_status,
            })
        })
        .collect()
}
