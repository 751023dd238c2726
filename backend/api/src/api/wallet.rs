use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use billnet_engine::Amount;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{page_limit, ApiJson, ApiState};
use crate::auth::{random_hex, AuthUser};
use crate::db::payments::{self, Payment, PaymentMethod};
use crate::db::wallets::{self, LedgerEntry};
use crate::db;
use crate::errors::{ApiError, Result};

/// Largest single top-up accepted.
const MAX_PAYMENT: Amount = Amount::from_dollars(10_000_000);

#[derive(Serialize)]
pub struct BalanceResponse {
    pub available: Amount,
    pub reserved: Amount,
    pub total: Amount,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    pub count: usize,
    pub transactions: Vec<LedgerEntry>,
}

#[derive(Serialize)]
pub struct PaymentMethodInfo {
    pub id: PaymentMethod,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct PaymentMethodsResponse {
    pub methods: Vec<PaymentMethodInfo>,
}

#[derive(Deserialize)]
pub struct InitiatePaymentRequest {
    pub method: PaymentMethod,
    pub amount: Amount,
}

#[derive(Serialize)]
pub struct InitiatePaymentResponse {
    pub payment: Payment,
    pub instructions: String,
}

/// `GET /wallet/balance`
pub async fn balance(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
) -> Result<Json<BalanceResponse>> {
    let mut conn = state.pool.acquire().await?;
    let wallet = wallets::load(&mut conn, user.id).await?;
    Ok(Json(BalanceResponse {
        available: wallet.available,
        reserved: wallet.reserved,
        total: wallet.total()?,
    }))
}

/// `GET /wallet/transactions`
pub async fn transactions(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<TransactionsResponse>> {
    let mut conn = state.pool.acquire().await?;
    let transactions =
        wallets::list_entries(&mut conn, user.id, page_limit(query.limit, 50, 200)).await?;
    Ok(Json(TransactionsResponse {
        count: transactions.len(),
        transactions,
    }))
}

/// `GET /wallet/payment-methods`
pub async fn payment_methods(_user: AuthUser) -> Json<PaymentMethodsResponse> {
    Json(PaymentMethodsResponse {
        methods: PaymentMethod::ALL
            .iter()
            .map(|method| PaymentMethodInfo {
                id: *method,
                label: method.label(),
            })
            .collect(),
    })
}

/// `POST /wallet/initiate-payment`
///
/// Creates a pending payment. Funds arrive only once an admin confirms it.
pub async fn initiate_payment(
    State(state): State<Arc<ApiState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<InitiatePaymentRequest>,
) -> Result<impl IntoResponse> {
    if !req.amount.is_positive() {
        return Err(ApiError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if req.amount > MAX_PAYMENT {
        return Err(ApiError::Validation(format!(
            "amount must be at most {MAX_PAYMENT}"
        )));
    }
    let reference = format!("BN-{}", random_hex(6).to_uppercase());

    let mut tx = state.begin_write().await?;
    let payment =
        payments::insert(&mut tx, user.id, req.method, req.amount, &reference, db::now()).await?;
    tx.commit().await?;

    info!(
        payment_id = payment.id,
        user_id = user.id,
        method = %payment.method,
        amount = %payment.amount,
        "payment initiated"
    );
    let instructions = payment.method.instructions(&payment.reference, payment.amount);
    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            payment,
            instructions,
        }),
    ))
}
