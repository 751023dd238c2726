//! BillNet API — entry point.
//!
//! Serves the marketplace REST API over SQLite and runs a background
//! reconciler that purges expired records and audits wallet reservations.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod escrow;
mod reconciler;


use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;
    let addr = format!("0.0.0.0:{}", config.api_port);
    let state = Arc::new(ApiState::new(pool, config));

    // ─── Background reconciler ────────────────────────────
    let shutdown = CancellationToken::new();
    let reconciler = tokio::spawn(reconciler::run(state.clone(), shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(state);

    info!("API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = reconciler.await {
        error!("Reconciler task panicked: {e}");
    }
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => {
                error!("Failed to listen for ctrl-c: {e}");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
}
