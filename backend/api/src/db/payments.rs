//! Wallet top-ups awaiting admin confirmation.

use billnet_engine::{text_enum, Amount, UserId};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::{ensure_updated, parse_tag};
use crate::errors::{ApiError, Result};

text_enum! {
    /// Supported ways of funding a wallet.
    pub enum PaymentMethod {
        BankTransfer => "bank_transfer",
        Bitcoin => "bitcoin",
        Card => "card",
    }
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::Bitcoin => "Bitcoin",
            PaymentMethod::Card => "Credit or debit card",
        }
    }

    /// What the payer is told to do with their reference.
    pub fn instructions(&self, reference: &str, amount: Amount) -> String {
        match self {
            PaymentMethod::BankTransfer => format!(
                "Transfer ${amount} to the BillNet escrow account quoting reference {reference}."
            ),
            PaymentMethod::Bitcoin => format!(
                "Send the BTC equivalent of ${amount} and include reference {reference} in the memo."
            ),
            PaymentMethod::Card => format!(
                "Complete the ${amount} card charge using reference {reference}."
            ),
        }
    }
}

text_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Confirmed => "confirmed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub amount: Amount,
    pub reference: String,
    pub status: PaymentStatus,
    pub created_at: i64,
    pub confirmed_at: Option<i64>,
}

#[derive(FromRow)]
struct PaymentRow {
    id: i64,
    user_id: i64,
    method: String,
    amount: i64,
    reference: String,
    status: String,
    created_at: i64,
    confirmed_at: Option<i64>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = ApiError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            user_id: row.user_id,
            method: parse_tag(&row.method)?,
            amount: Amount::from_cents(row.amount),
            reference: row.reference,
            status: parse_tag(&row.status)?,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
        })
    }
}

pub async fn insert(
    conn: &mut SqliteConnection,
    user_id: UserId,
    method: PaymentMethod,
    amount: Amount,
    reference: &str,
    now: i64,
) -> Result<Payment> {
    let id = sqlx::query(
        r#"
        INSERT INTO payments (user_id, method, amount, reference, status, created_at)
        VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
        "#,
    )
    .bind(user_id)
    .bind(method.as_str())
    .bind(amount.cents())
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    load(conn, id).await
}

pub async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Payment> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, user_id, method, amount, reference, status, created_at, confirmed_at
        FROM   payments
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Payment::try_from)
        .transpose()?
        .ok_or(ApiError::NotFound("payment"))
}

/// Flip a pending payment to confirmed.
pub async fn mark_confirmed(conn: &mut SqliteConnection, id: i64, now: i64) -> Result<()> {
    let done = sqlx::query(
        "UPDATE payments SET status = 'confirmed', confirmed_at = ?2 WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    ensure_updated(done.rows_affected(), "payment")
}
