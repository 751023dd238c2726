//! Database layer — pool setup, migrations, and the serialized write path.
//!
//! Queries live in one submodule per table group. Every query function takes
//! a `&mut SqliteConnection`, so the same code runs against a pooled
//! connection for reads and inside a [`WriteTx`] for writes.

pub mod bids;
pub mod ideas;
pub mod idempotency;
pub mod notifications;
pub mod payments;
pub mod social;
pub mod tokens;
pub mod users;
pub mod verification;
pub mod wallets;

use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::errors::{ApiError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let in_memory = url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // An in-memory database lives and dies with its connection, so the pool
    // keeps exactly one open for the lifetime of the process.
    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A transaction that holds the process-wide write gate until it is
/// committed or dropped. Dropping it rolls back.
pub struct WriteTx<'a> {
    tx: Transaction<'static, Sqlite>,
    _gate: MutexGuard<'a, ()>,
}

impl<'a> WriteTx<'a> {
    pub async fn begin(pool: &SqlitePool, gate: &'a Mutex<()>) -> Result<WriteTx<'a>> {
        let guard = gate.lock().await;
        let tx = pool.begin().await?;
        Ok(WriteTx { tx, _gate: guard })
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Deref for WriteTx<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl DerefMut for WriteTx<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

/// Fail with `Conflict` when a guarded update matched no row.
pub(crate) fn ensure_updated(rows_affected: u64, what: &str) -> Result<()> {
    if rows_affected == 0 {
        Err(ApiError::Conflict(format!(
            "{what} was modified concurrently; retry the request"
        )))
    } else {
        Ok(())
    }
}

/// Parse a stored text tag into an engine enum.
pub(crate) fn parse_tag<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = billnet_engine::Error>,
{
    value
        .parse()
        .map_err(|e: billnet_engine::Error| ApiError::Corrupt(e.to_string()))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    init_pool("sqlite::memory:").await.unwrap()
}
