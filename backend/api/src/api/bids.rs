//! Bid placement, negotiation and the investor portfolio.
//!
//! Every money-moving route funnels through [`run_bid_command`], which owns
//! the write transaction and the `Idempotency-Key` handling.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use billnet_engine::{funding, Amount, Bid, BidId, BidTerms, Equity, IdeaId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiJson, ApiState};
use crate::auth::AuthUser;
use crate::db::bids::{self, BidSummary, InvestmentSummary};
use crate::db::idempotency::{self, IdempotencyRecord};
use crate::db::{self, ideas};
use crate::errors::{ApiError, Result};
use crate::escrow::{self, BidCommand};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";
const MAX_KEY_LEN: usize = 255;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub idea_id: IdeaId,
    pub bid_amount: Amount,
    pub equity_percentage: Equity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRequest {
    pub counter_amount: Amount,
    pub counter_equity: Equity,
}

#[derive(Serialize)]
pub struct BidsResponse {
    pub count: usize,
    pub bids: Vec<Bid>,
}

#[derive(Serialize)]
pub struct MyBidsResponse {
    pub count: usize,
    pub bids: Vec<BidSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub count: usize,
    pub investments: Vec<InvestmentSummary>,
    pub total_invested: Amount,
}

/// Reads the optional `Idempotency-Key` header.
fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::Validation("Idempotency-Key must be visible ASCII".to_string()))?
        .trim();
    if key.is_empty() || key.len() > MAX_KEY_LEN || !key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ApiError::Validation(format!(
            "Idempotency-Key must be 1 to {MAX_KEY_LEN} visible ASCII characters"
        )));
    }
    Ok(Some(key.to_string()))
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

fn replay(record: IdempotencyRecord) -> Result<Response> {
    let status = u16::try_from(record.status_code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| {
            ApiError::Corrupt(format!(
                "stored idempotent status {} is not an HTTP status",
                record.status_code
            ))
        })?;
    Ok(json_response(status, record.response_body))
}

/// Run one bid command in its own write transaction.
///
/// With a key, a previous success for the same request is replayed as-is and
/// a key reused for a different request is refused. Failures are never
/// stored, so a retry after an error runs the command again.
async fn run_bid_command(
    state: &ApiState,
    user: &AuthUser,
    headers: &HeaderMap,
    command: BidCommand,
    success: StatusCode,
) -> Result<Response> {
    let key = idempotency_key(headers)?;
    let now = db::now();

    let mut tx = state.begin_write().await?;

    let fingerprint = match &key {
        Some(key) => {
            let fingerprint = command.fingerprint()?;
            let not_before = now - state.config.idempotency_ttl_secs;
            if let Some(record) = idempotency::find(&mut tx, user.id, key, not_before).await? {
                if record.fingerprint != fingerprint {
                    return Err(ApiError::Validation(
                        "Idempotency-Key was already used for a different request".to_string(),
                    ));
                }
                debug!(user_id = user.id, key = %key, "replaying stored response");
                return replay(record);
            }
            Some(fingerprint)
        }
        None => None,
    };

    let bid = escrow::execute(
        &mut tx,
        &state.config.bid_policy(),
        &user.caller(),
        &command,
        now,
    )
    .await?;
    let body = serde_json::to_string(&bid)?;

    if let (Some(key), Some(fingerprint)) = (key, fingerprint) {
        let record = IdempotencyRecord {
            fingerprint,
            status_code: i64::from(success.as_u16()),
            response_body: body.clone(),
        };
        idempotency::store(&mut tx, user.id, &key, &record, now).await?;
    }
    tx.commit().await?;

    Ok(json_response(success, body))
}

/// `POST /bids`
pub async fn place_bid(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    headers: HeaderMap,
    ApiJson(req): ApiJson<PlaceBidRequest>,
) -> Result<Response> {
    let command = BidCommand::Place {
        idea_id: req.idea_id,
        terms: BidTerms::new(req.bid_amount, req.equity_percentage),
    };
    run_bid_command(&state, &user, &headers, command, StatusCode::CREATED).await
}

/// `PUT /bids/:id/accept`
pub async fn accept_bid(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(bid_id): Path<BidId>,
    headers: HeaderMap,
) -> Result<Response> {
    run_bid_command(&state, &user, &headers, BidCommand::Accept { bid_id }, StatusCode::OK).await
}

/// `PUT /bids/:id/reject`
pub async fn reject_bid(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(bid_id): Path<BidId>,
    headers: HeaderMap,
) -> Result<Response> {
    run_bid_command(&state, &user, &headers, BidCommand::Reject { bid_id }, StatusCode::OK).await
}

/// `PUT /bids/:id/counter`
pub async fn counter_bid(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(bid_id): Path<BidId>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CounterRequest>,
) -> Result<Response> {
    let command = BidCommand::Counter {
        bid_id,
        terms: BidTerms::new(req.counter_amount, req.counter_equity),
    };
    run_bid_command(&state, &user, &headers, command, StatusCode::OK).await
}

/// `PUT /bids/:id/counter/accept`
pub async fn accept_counter(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(bid_id): Path<BidId>,
    headers: HeaderMap,
) -> Result<Response> {
    let command = BidCommand::AcceptCounter { bid_id };
    run_bid_command(&state, &user, &headers, command, StatusCode::OK).await
}

/// `PUT /bids/:id/counter/reject`
pub async fn reject_counter(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(bid_id): Path<BidId>,
    headers: HeaderMap,
) -> Result<Response> {
    let command = BidCommand::RejectCounter { bid_id };
    run_bid_command(&state, &user, &headers, command, StatusCode::OK).await
}

/// `GET /bids/:id/list`
///
/// All bids on an idea. Only its owner may look.
pub async fn list_idea_bids(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Path(idea_id): Path<IdeaId>,
) -> Result<Json<BidsResponse>> {
    let mut conn = state.pool.acquire().await?;
    let idea = ideas::load(&mut conn, idea_id).await?;
    funding::ensure_owner(&user.caller(), &idea)?;

    let bids = bids::list_for_idea(&mut conn, idea_id).await?;
    Ok(Json(BidsResponse {
        count: bids.len(),
        bids,
    }))
}

/// `GET /bids/my-bids`
pub async fn my_bids(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<MyBidsResponse>> {
    let mut conn = state.pool.acquire().await?;
    let bids = bids::list_by_investor(&mut conn, user.id).await?;
    Ok(Json(MyBidsResponse {
        count: bids.len(),
        bids,
    }))
}

/// `GET /investments/my-investments`
pub async fn my_investments(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<PortfolioResponse>> {
    let mut conn = state.pool.acquire().await?;
    let investments = bids::list_investments(&mut conn, user.id).await?;

    let total_invested = investments
        .iter()
        .try_fold(Amount::ZERO, |total, summary| {
            total.checked_add(summary.investment.amount)
        })?;
    info!(user_id = user.id, count = investments.len(), "portfolio listed");

    Ok(Json(PortfolioResponse {
        count: investments.len(),
        investments,
        total_invested,
    }))
}
