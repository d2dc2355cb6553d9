//! # User Repository
//!
//! Accounts, plus the shipping address and payment method checkout reads.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{PaymentMethod, Role, ShippingAddress, User};

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: Role,
    address: Option<String>,
    payment_method: Option<PaymentMethod>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let address = row
            .address
            .as_deref()
            .map(serde_json::from_str::<ShippingAddress>)
            .transpose()?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            address,
            payment_method: row.payment_method,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, address, payment_method, created_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Looks a user up by email, case-insensitively.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Inserts a new user. A taken email fails with `UniqueViolation`.
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(user_id = %user.id, "Inserting user");

        let address = user.address.as_ref().map(serde_json::to_string).transpose()?;
        let email = normalize_email(&user.email);

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, address, payment_method,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(address)
        .bind(user.payment_method)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation { field, value: email.clone() },
            other => other,
        })?;

        Ok(())
    }

    pub async fn update_address(&self, user_id: &str, address: &ShippingAddress) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET address = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(user_id)
            .bind(serde_json::to_string(address)?)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }
        Ok(())
    }

    pub async fn update_payment_method(&self, user_id: &str, method: PaymentMethod) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET payment_method = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(user_id)
                .bind(method)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }
        Ok(())
    }

    pub async fn update_name(&self, user_id: &str, name: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET name = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(user_id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
