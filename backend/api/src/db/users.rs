//! Accounts and profiles.

use billnet_engine::{Role, UserId};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::{ensure_updated, parse_tag};
use crate::errors::{ApiError, Result};

/// A user as exposed over the API. Credentials never leave this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<Role>,
    pub is_certified: bool,
    pub is_email_verified: bool,
    pub bio: String,
    pub location: String,
    pub created_at: i64,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    role: Option<String>,
    is_certified: bool,
    is_email_verified: bool,
    bio: String,
    location: String,
    created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role: row.role.as_deref().map(parse_tag::<Role>).transpose()?,
            is_certified: row.is_certified,
            is_email_verified: row.is_email_verified,
            bio: row.bio,
            location: row.location,
            created_at: row.created_at,
        })
    }
}

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub password_salt: &'a str,
}

pub struct Credentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, role, is_certified, \
                            is_email_verified, bio, location, created_at";

/// Create an account. A taken email surfaces as `Conflict`.
pub async fn insert(conn: &mut SqliteConnection, new: &NewUser<'_>, now: i64) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (first_name, last_name, email, password_hash, password_salt, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(new.first_name)
    .bind(new.last_name)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.password_salt)
    .bind(now)
    .execute(&mut *conn)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::Conflict("email is already registered".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    find(conn, id)
        .await?
        .ok_or_else(|| ApiError::Corrupt(format!("user {id} vanished after insert")))
}

pub async fn find(conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(User::try_from).transpose()
}

/// Look an account up by email (case-insensitive) together with its
/// password material.
pub async fn find_credentials(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<Credentials>> {
    #[derive(FromRow)]
    struct Row {
        #[sqlx(flatten)]
        user: UserRow,
        password_hash: String,
        password_salt: String,
    }

    let row = sqlx::query_as::<_, Row>(&format!(
        "SELECT {USER_COLUMNS}, password_hash, password_salt FROM users WHERE email = ?1"
    ))
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        Ok(Credentials {
            user: User::try_from(r.user)?,
            password_hash: r.password_hash,
            password_salt: r.password_salt,
        })
    })
    .transpose()
}

pub struct ProfileUpdate<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: UserId,
    update: &ProfileUpdate<'_>,
) -> Result<()> {
    let done = sqlx::query(
        r#"
        UPDATE users
        SET    first_name = COALESCE(?2, first_name),
               last_name  = COALESCE(?3, last_name),
               bio        = COALESCE(?4, bio),
               location   = COALESCE(?5, location)
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .bind(update.first_name)
    .bind(update.last_name)
    .bind(update.bio)
    .bind(update.location)
    .execute(&mut *conn)
    .await?;
    if done.rows_affected() == 0 {
        return Err(ApiError::NotFound("user"));
    }
    Ok(())
}

/// Set the marketplace role. Only succeeds while no role is set.
pub async fn set_role(conn: &mut SqliteConnection, id: UserId, role: Role) -> Result<()> {
    let done = sqlx::query("UPDATE users SET role = ?2 WHERE id = ?1 AND role IS NULL")
        .bind(id)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;
    if done.rows_affected() == 0 {
        return Err(ApiError::Conflict("profile role is already set".to_string()));
    }
    Ok(())
}

pub async fn set_password(
    conn: &mut SqliteConnection,
    id: UserId,
    password_hash: &str,
    password_salt: &str,
) -> Result<()> {
    let done = sqlx::query("UPDATE users SET password_hash = ?2, password_salt = ?3 WHERE id = ?1")
        .bind(id)
        .bind(password_hash)
        .bind(password_salt)
        .execute(&mut *conn)
        .await?;
    ensure_updated(done.rows_affected(), "user")
}

pub async fn mark_email_verified(conn: &mut SqliteConnection, id: UserId) -> Result<()> {
    sqlx::query("UPDATE users SET is_email_verified = 1 WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_certified(conn: &mut SqliteConnection, id: UserId, certified: bool) -> Result<()> {
    sqlx::query("UPDATE users SET is_certified = ?2 WHERE id = ?1")
        .bind(id)
        .bind(certified)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
