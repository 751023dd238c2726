//! Sessions, password hashing, and one-time secrets.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use billnet_engine::{Caller, Role, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::api::ApiState;
use crate::db;
use crate::errors::{ApiError, Result};

/// PBKDF2-HMAC-SHA256 iterations for new hashes.
pub const DEFAULT_HASH_ROUNDS: u32 = 600_000;
const HASH_SCHEME: &str = "pbkdf2-sha256";
const HASH_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub exp: usize,  // Expiration timestamp
    pub iat: usize,  // Issued at timestamp
}

pub fn create_token(user_id: UserId, secret: &str, expiration_seconds: u64) -> Result<String> {
    let now = Utc::now();
    let exp = i64::try_from(expiration_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .and_then(|exp| usize::try_from(exp.timestamp()).ok())
        .ok_or_else(|| {
            ApiError::Config(format!("token lifetime {expiration_seconds}s is out of range"))
        })?;
    let iat = now.timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        iat,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::Unauthorized("token expired"),
        _ => ApiError::Unauthorized("invalid token"),
    })
}

/// The authenticated caller. Role is re-read from the database on every
/// request so onboarding takes effect without a new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Option<Role>,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.id, self.role)
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.role == Some(Role::Admin) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin access required".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("missing authorization token"))?;

        let claims = validate_token(token.trim(), &state.config.jwt_secret)?;
        let user_id: UserId = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("invalid token"))?;

        let mut conn = state.pool.acquire().await?;
        let user = db::users::find(&mut conn, user_id)
            .await?
            .ok_or(ApiError::Unauthorized("account no longer exists"))?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Passwords
// ─────────────────────────────────────────────────────────

/// Random hex string of `bytes` bytes of entropy.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn new_salt() -> String {
    random_hex(16)
}

fn derive(password: &str, salt: &str, rounds: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut out);
    out
}

/// Hash `password` as `pbkdf2-sha256$<rounds>$<hex>`.
///
/// The derivation is CPU-bound and runs on the blocking pool.
pub async fn hash_password(password: &str, salt: &str, rounds: u32) -> Result<String> {
    let (password, salt) = (password.to_owned(), salt.to_owned());
    let digest = tokio::task::spawn_blocking(move || derive(&password, &salt, rounds)).await?;
    Ok(format!("{HASH_SCHEME}${rounds}${}", hex::encode(digest)))
}

/// Check `password` against a stored hash, using the round count recorded in it.
pub async fn verify_password(password: &str, salt: &str, stored: &str) -> Result<bool> {
    let (rounds, expected) = parse_stored_hash(stored)?;
    let (password, salt) = (password.to_owned(), salt.to_owned());
    let digest = tokio::task::spawn_blocking(move || derive(&password, &salt, rounds)).await?;
    Ok(bool::from(digest.as_slice().ct_eq(&expected)))
}

fn parse_stored_hash(stored: &str) -> Result<(u32, Vec<u8>)> {
    let corrupt = || ApiError::Corrupt("stored password hash is malformed".to_string());
    let mut parts = stored.split('$');
    if parts.next() != Some(HASH_SCHEME) {
        return Err(corrupt());
    }
    let rounds: u32 = parts
        .next()
        .and_then(|r| r.parse().ok())
        .filter(|r| *r > 0)
        .ok_or_else(corrupt)?;
    let expected = parts
        .next()
        .and_then(|h| hex::decode(h).ok())
        .filter(|h| h.len() == HASH_LEN)
        .ok_or_else(corrupt)?;
    if parts.next().is_some() {
        return Err(corrupt());
    }
    Ok((rounds, expected))
}
