//! User repository implementation.

use sqlx::{PgConnection, PgPool};

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::UserId;
use drive_entity::user::User;

use super::{expect_row, store_error};

const COLUMNS: &str = "id, username, password_hash, used_space, drive_id, bin_id, created_at";

/// Repository for user accounts and the quota ledger.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find user", e))
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find user by username", e))
    }

    /// Insert a user inside a transaction.
    pub async fn insert(conn: &mut PgConnection, user: &User) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.used_space)
        .bind(user.drive_id)
        .bind(user.bin_id)
        .bind(user.created_at)
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to insert user", e))?;
        Ok(())
    }

    /// Shift a user's used space by `delta`, never below zero.
    ///
    /// With a `limit`, the update only matches while the new total stays
    /// within it, so a miss means the quota would be exceeded.
    pub async fn adjust_used_space(
        conn: &mut PgConnection,
        user_id: UserId,
        delta: i64,
        limit: Option<i64>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET used_space = GREATEST(used_space + $2, 0) \
             WHERE id = $1 AND ($3::BIGINT IS NULL OR used_space + $2 <= $3)",
        )
        .bind(user_id)
        .bind(delta)
        .bind(limit)
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to adjust used space", e))?;

        if result.rows_affected() == 0 && limit.is_some() {
            return Err(AppError::quota_exceeded(format!(
                "Reserving {delta} bytes would exceed the quota of user {user_id}"
            )));
        }
        expect_row(result.rows_affected(), || format!("User {user_id}"))
    }
}
