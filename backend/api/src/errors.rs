//! Application-wide error types.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use billnet_engine::Error as EngineError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Engine(e) => engine_status(e),
            ApiError::Database(_)
            | ApiError::Migrate(_)
            | ApiError::Json(_)
            | ApiError::Token(_)
            | ApiError::Task(_)
            | ApiError::Config(_)
            | ApiError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidAmount(_)
        | EngineError::InvalidEquity(_)
        | EngineError::Validation(_)
        | EngineError::AmountOutOfRange
        | EngineError::InsufficientFunds { .. }
        | EngineError::BelowMinimumBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::SelfBid | EngineError::NotAuthorized(_) | EngineError::RoleRequired(_) => {
            StatusCode::FORBIDDEN
        }
        EngineError::IdeaNotOpen(_)
        | EngineError::IdeaHasInvestments(_)
        | EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::ReservationMismatch { .. }
        | EngineError::SelfTransfer
        | EngineError::Inconsistent(_)
        | EngineError::UnknownVariant { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            "internal server error".to_string()
        } else {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!("Request refused ({status}): {self}");
            } else {
                debug!("Request rejected ({status}): {self}");
            }
            self.to_string()
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
