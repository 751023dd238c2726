//! Axum REST API: shared state, router, and request plumbing.

mod admin;
mod auth;
mod bids;
mod ideas;
mod messages;
mod notifications;
mod social;
mod users;
mod wallet;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::WriteTx;
use crate::errors::{ApiError, Result};

pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Serializes every write transaction in the process.
    write_gate: Mutex<()>,
}

impl ApiState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            pool,
            config,
            write_gate: Mutex::new(()),
        }
    }

    /// Wait for the write gate and open a transaction.
    ///
    /// Handlers must not hold another pooled connection while calling this.
    pub async fn begin_write(&self) -> Result<WriteTx<'_>> {
        WriteTx::begin(&self.pool, &self.write_gate).await
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        // Accounts
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/verify-email", get(auth::verify_email))
        .route("/user/profile", get(users::get_profile).put(users::update_profile))
        .route("/user/complete-profile", post(users::complete_profile))
        .route("/user/verification/status", get(users::verification_status))
        .route("/user/verification/request", post(users::request_verification))
        // Wallet
        .route("/wallet/balance", get(wallet::balance))
        .route("/wallet/transactions", get(wallet::transactions))
        .route("/wallet/payment-methods", get(wallet::payment_methods))
        .route("/wallet/initiate-payment", post(wallet::initiate_payment))
        // Ideas
        .route("/ideas", get(ideas::list_ideas).post(ideas::create_idea))
        .route("/ideas/search", get(ideas::search_ideas))
        .route("/ideas/my-ideas", get(ideas::my_ideas))
        .route(
            "/ideas/:id",
            get(ideas::get_idea)
                .put(ideas::update_idea)
                .delete(ideas::delete_idea),
        )
        .route("/ideas/:id/close", post(ideas::close_idea))
        // Bids
        .route("/bids", post(bids::place_bid))
        .route("/bids/my-bids", get(bids::my_bids))
        .route("/bids/:id/list", get(bids::list_idea_bids))
        .route("/bids/:id/accept", put(bids::accept_bid))
        .route("/bids/:id/reject", put(bids::reject_bid))
        .route("/bids/:id/counter", put(bids::counter_bid))
        .route("/bids/:id/counter/accept", put(bids::accept_counter))
        .route("/bids/:id/counter/reject", put(bids::reject_counter))
        .route("/investments/my-investments", get(bids::my_investments))
        // Social
        .route("/comments", post(social::add_comment))
        .route("/comments/:id", get(social::list_comments))
        .route("/favorites/:id", post(social::toggle_favorite))
        .route("/follows/:id", post(social::toggle_follow))
        .route("/messages", post(messages::send_message))
        .route("/messages/conversations", get(messages::conversations))
        .route("/messages/:id", get(messages::thread))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Operators
        .route("/admin/verification/:id/decide", post(admin::decide_verification))
        .route("/admin/payments/:id/confirm", post(admin::confirm_payment));

    Router::new()
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Shared response shapes & extractors
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// `Json<T>` whose rejections use the API's `{"error": ...}` body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Trimmed, non-empty text field with an upper length bound.
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

/// Clamp a client-supplied page size.
pub(crate) fn page_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
