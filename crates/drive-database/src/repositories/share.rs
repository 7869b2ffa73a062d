//! Share repository implementation.

use sqlx::{PgConnection, PgPool};

use drive_core::result::AppResult;
use drive_core::types::ShareId;
use drive_entity::share::Share;

use super::{expect_row, store_error};

/// Repository for share groups and their reference counts.
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a share by ID.
    pub async fn find_by_id(&self, id: ShareId) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT id, can_read_users, can_edit_users, created_at, updated_at \
             FROM shares WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find share", e))
    }

    /// Count entries and bin records referencing the share.
    pub async fn count_references(&self, id: ShareId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM entries WHERE share_id = $1) \
                  + (SELECT COUNT(*) FROM bin WHERE prev_share_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to count share references", e))?;
        Ok(count.max(0) as u64)
    }

    /// Delete every share no entry or bin record points at.
    pub async fn delete_unreferenced(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM shares s \
             WHERE NOT EXISTS (SELECT 1 FROM entries e WHERE e.share_id = s.id) \
               AND NOT EXISTS (SELECT 1 FROM bin b WHERE b.prev_share_id = s.id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to delete unreferenced shares", e))?;
        Ok(result.rows_affected())
    }

    /// Insert a share inside a transaction.
    pub async fn insert(conn: &mut PgConnection, share: &Share) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO shares (id, can_read_users, can_edit_users, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(share.id)
        .bind(&share.can_read_users)
        .bind(&share.can_edit_users)
        .bind(share.created_at)
        .bind(share.updated_at)
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to insert share", e))?;
        Ok(())
    }

    /// Replace the member lists of a share inside a transaction.
    pub async fn update(conn: &mut PgConnection, share: &Share) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE shares SET can_read_users = $2, can_edit_users = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(share.id)
        .bind(&share.can_read_users)
        .bind(&share.can_edit_users)
        .bind(share.updated_at)
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to update share", e))?;
        expect_row(result.rows_affected(), || format!("Share {}", share.id))
    }
}
