//! Application configuration loaded from environment variables.

use billnet_engine::{Amount, BidPolicy};
use rust_decimal::Decimal;

use crate::auth::DEFAULT_HASH_ROUNDS;
use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL (`sqlite:./billnet.db`, `sqlite::memory:`)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// Session token lifetime in seconds
    pub token_ttl_secs: u64,
    /// Nominal wallet balance required before an investor may bid
    pub min_bid_balance: Amount,
    /// How long a stored `Idempotency-Key` response is replayed
    pub idempotency_ttl_secs: i64,
    /// How often (in seconds) the reconciler runs
    pub reconcile_interval_secs: u64,
    /// Lowercased emails that receive the admin role when they sign up
    pub admin_emails: Vec<String>,
    /// PBKDF2 iterations for newly stored password hashes
    pub password_hash_rounds: u32,
}

/// Ten years. Longer session lifetimes are refused at startup.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 3600;
pub const MIN_HASH_ROUNDS: u32 = 100_000;

impl Config {
    pub fn from_env() -> Result<Self> {
        let min_bid_balance: Decimal = env_var("MIN_BID_BALANCE")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid MIN_BID_BALANCE".to_string()))?;

        let config = Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./billnet.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid API_PORT".to_string()))?,
            jwt_secret: env_var("JWT_SECRET").map_err(|_| {
                ApiError::Config("JWT_SECRET environment variable is required".to_string())
            })?,
            token_ttl_secs: env_var("TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid TOKEN_TTL_SECS".to_string()))?,
            min_bid_balance: Amount::from_decimal(min_bid_balance)
                .map_err(|_| ApiError::Config("Invalid MIN_BID_BALANCE".to_string()))?,
            idempotency_ttl_secs: env_var("IDEMPOTENCY_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid IDEMPOTENCY_TTL_SECS".to_string()))?,
            reconcile_interval_secs: env_var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid RECONCILE_INTERVAL_SECS".to_string()))?,
            admin_emails: env_var("ADMIN_EMAILS")
                .map(|list| parse_email_list(&list))
                .unwrap_or_default(),
            password_hash_rounds: match env_var("PASSWORD_HASH_ROUNDS") {
                Ok(rounds) => rounds
                    .parse()
                    .map_err(|_| ApiError::Config("Invalid PASSWORD_HASH_ROUNDS".to_string()))?,
                Err(_) => DEFAULT_HASH_ROUNDS,
            },
        };

        if config.jwt_secret.trim().is_empty() {
            return Err(ApiError::Config("JWT_SECRET must not be empty".to_string()));
        }
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&config.token_ttl_secs) {
            return Err(ApiError::Config(format!(
                "TOKEN_TTL_SECS must be between 1 and {MAX_TOKEN_TTL_SECS}"
            )));
        }
        if config.password_hash_rounds < MIN_HASH_ROUNDS {
            return Err(ApiError::Config(format!(
                "PASSWORD_HASH_ROUNDS must be at least {MIN_HASH_ROUNDS}"
            )));
        }
        if config.min_bid_balance.is_negative() {
            return Err(ApiError::Config(
                "MIN_BID_BALANCE must not be negative".to_string(),
            ));
        }
        if config.reconcile_interval_secs == 0 {
            return Err(ApiError::Config(
                "RECONCILE_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Whether a (normalized) email is on the admin bootstrap list.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin == email)
    }

    pub fn bid_policy(&self) -> BidPolicy {
        BidPolicy {
            min_wallet_balance: self.min_bid_balance,
        }
    }
}

fn parse_email_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::Config(format!("Missing env var: {key}")))
}
