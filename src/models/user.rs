use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use super::timestamps;
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    #[serde(skip_serializing)]
    pub is_active: bool,
    #[serde(with = "timestamps::utc_naive")]
    pub date_joined: NaiveDateTime,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, is_staff, is_active, date_joined";

impl User {
    // Emails are matched case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        is_staff: bool,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, is_staff, is_active, date_joined)
             VALUES ($1, $2, $3, $4, $5, TRUE, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(normalize_email(email))
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(is_staff)
        .bind(timestamps::now())
        .fetch_one(pool)
        .await
        .map_err(email_taken)?;
        Ok(user)
    }

    /// Applies the given changes; absent fields keep their value.
    pub async fn update_profile(
        pool: &PgPool,
        id: i64,
        changes: &ProfileUpdate,
    ) -> Result<Option<User>, AppError> {
        let password_hash = changes.password.as_deref().map(hash_password).transpose()?;
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET email = COALESCE($2, email),
                 password_hash = COALESCE($3, password_hash),
                 first_name = COALESCE($4, first_name),
                 last_name = COALESCE($5, last_name)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.email.as_deref().map(normalize_email))
        .bind(password_hash)
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .fetch_optional(pool)
        .await
        .map_err(email_taken)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

/// Partial profile change sent to `PATCH /api/user/me`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

fn email_taken(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            FieldErrors::single("email", "user with this email already exists.").into()
        }
        other => AppError::from(other),
    }
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// Lower-cases the domain part, like most mail systems treat it.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
