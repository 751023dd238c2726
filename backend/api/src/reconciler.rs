//! Long-running background task that keeps the store tidy: expired
//! idempotency records and one-time tokens are purged, and every wallet's
//! reserved balance is checked against the bids that hold it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::ApiState;
use crate::db::{self, idempotency, tokens, wallets};
use crate::errors::Result;

/// Outcome of one pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub idempotency_purged: u64,
    pub tokens_purged: u64,
    pub drifted_wallets: usize,
}

/// Run passes every `reconcile_interval_secs` until `shutdown` fires.
pub async fn run(state: Arc<ApiState>, shutdown: CancellationToken) {
    let period = Duration::from_secs(state.config.reconcile_interval_secs);
    info!("Reconciler starting, interval {}s", period.as_secs());

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match reconcile_once(&state).await {
            Ok(report) if report == Report::default() => debug!("Reconcile pass: nothing to do"),
            Ok(report) => info!(
                idempotency_purged = report.idempotency_purged,
                tokens_purged = report.tokens_purged,
                drifted_wallets = report.drifted_wallets,
                "Reconcile pass finished"
            ),
            Err(e) => error!("Reconcile pass failed: {e}"),
        }
    }

    info!("Reconciler stopped");
}

/// A single pass. Purges are committed before the drift check runs.
pub async fn reconcile_once(state: &ApiState) -> Result<Report> {
    let now = db::now();

    let (idempotency_purged, tokens_purged) = {
        let mut tx = state.begin_write().await?;
        let cutoff = now - state.config.idempotency_ttl_secs;
        let idempotency_purged = idempotency::purge_older_than(&mut tx, cutoff).await?;
        let tokens_purged = tokens::purge_expired(&mut tx, now).await?;
        tx.commit().await?;
        (idempotency_purged, tokens_purged)
    };

    let mut conn = state.pool.acquire().await?;
    let drift = wallets::reservation_drift(&mut conn).await?;
    for wallet in &drift {
        error!(
            user_id = wallet.user_id,
            reserved = %wallet.reserved,
            held_by_open_bids = %wallet.held_by_open_bids,
            "reserved balance does not match open bids"
        );
    }

    Ok(Report {
        idempotency_purged,
        tokens_purged,
        drifted_wallets: drift.len(),
    })
}
