//! Wallet balances and the append-only ledger.
//!
//! Balances change only through [`record`], which applies each engine
//! [`LedgerMovement`] as a guarded delta and appends the matching ledger row.

use billnet_engine::{Amount, BidId, LedgerEntryKind, LedgerMovement, UserId, Wallet};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};
use tracing::info;

use super::parse_tag;
use crate::errors::{ApiError, Result};

#[derive(FromRow)]
struct WalletRow {
    user_id: i64,
    available: i64,
    reserved: i64,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            user_id: row.user_id,
            available: Amount::from_cents(row.available),
            reserved: Amount::from_cents(row.reserved),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub kind: LedgerEntryKind,
    pub amount: Amount,
    pub bid_id: Option<BidId>,
    pub created_at: i64,
}

#[derive(FromRow)]
struct LedgerRow {
    id: i64,
    user_id: i64,
    kind: String,
    amount: i64,
    bid_id: Option<i64>,
    created_at: i64,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = ApiError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        Ok(LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            kind: parse_tag(&row.kind)?,
            amount: Amount::from_cents(row.amount),
            bid_id: row.bid_id,
            created_at: row.created_at,
        })
    }
}

/// Open an empty wallet for a new account.
pub async fn create(conn: &mut SqliteConnection, user_id: UserId) -> Result<()> {
    sqlx::query("INSERT INTO wallets (user_id, available, reserved) VALUES (?1, 0, 0)")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn load(conn: &mut SqliteConnection, user_id: UserId) -> Result<Wallet> {
    let row = sqlx::query_as::<_, WalletRow>(
        "SELECT user_id, available, reserved FROM wallets WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Wallet::from).ok_or(ApiError::NotFound("wallet"))
}

/// Apply ledger movements to the stored balances and append them to the
/// ledger.
///
/// Each update only matches while the resulting balances stay non-negative,
/// so a concurrent writer that drained the wallet turns into a `Conflict`
/// instead of an overdraft.
pub async fn record(
    conn: &mut SqliteConnection,
    movements: &[LedgerMovement],
    now: i64,
) -> Result<()> {
    for movement in movements {
        let available = movement.available_delta();
        let reserved = movement.reserved_delta();

        let done = sqlx::query(
            r#"
            UPDATE wallets
            SET    available = available + ?2,
                   reserved  = reserved + ?3
            WHERE  user_id = ?1
              AND  available + ?2 >= 0
              AND  reserved + ?3 >= 0
            "#,
        )
        .bind(movement.user_id)
        .bind(available)
        .bind(reserved)
        .execute(&mut *conn)
        .await?;
        if done.rows_affected() == 0 {
            return Err(ApiError::Conflict(format!(
                "wallet of user {} changed concurrently; retry the request",
                movement.user_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, kind, amount, bid_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(movement.user_id)
        .bind(movement.kind.as_str())
        .bind(movement.amount.cents())
        .bind(movement.bid_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        info!(
            user_id = movement.user_id,
            kind = %movement.kind,
            amount = %movement.amount,
            bid_id = ?movement.bid_id,
            "ledger movement recorded"
        );
    }
    Ok(())
}

/// A user's ledger, newest first.
pub async fn list_entries(
    conn: &mut SqliteConnection,
    user_id: UserId,
    limit: i64,
) -> Result<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, LedgerRow>(
        r#"
        SELECT id, user_id, kind, amount, bid_id, created_at
        FROM   ledger_entries
        WHERE  user_id = ?1
        ORDER  BY id DESC
        LIMIT  ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

/// A wallet whose `reserved` column disagrees with its open bids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationDrift {
    pub user_id: UserId,
    pub reserved: Amount,
    pub held_by_open_bids: Amount,
}

pub async fn reservation_drift(conn: &mut SqliteConnection) -> Result<Vec<ReservationDrift>> {
    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT w.user_id, w.reserved, COALESCE(SUM(b.reserved), 0) AS held
        FROM   wallets w
        LEFT   JOIN bids b
               ON b.investor_id = w.user_id AND b.status IN ('pending', 'countered')
        GROUP  BY w.user_id, w.reserved
        HAVING w.reserved != held
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(user_id, reserved, held)| ReservationDrift {
            user_id,
            reserved: Amount::from_cents(reserved),
            held_by_open_bids: Amount::from_cents(held),
        })
        .collect())
}
