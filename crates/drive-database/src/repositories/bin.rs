//! Bin registry repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use drive_core::result::AppResult;
use drive_core::types::EntryId;
use drive_entity::bin::BinRecord;

use super::{expect_row, store_error};

const COLUMNS: &str = "id, put_at, prev_parent_id, prev_share_id, prev_name";

/// Repository for bin records.
#[derive(Debug, Clone)]
pub struct BinRepository {
    pool: PgPool,
}

impl BinRepository {
    /// Create a new bin repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the record of a binned entry.
    pub async fn find_by_id(&self, id: EntryId) -> AppResult<Option<BinRecord>> {
        sqlx::query_as::<_, BinRecord>(&format!("SELECT {COLUMNS} FROM bin WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find bin record", e))
    }

    /// Find every record among `ids`.
    pub async fn find_by_ids(&self, ids: &[EntryId]) -> AppResult<Vec<BinRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, BinRecord>(&format!("SELECT {COLUMNS} FROM bin WHERE id = ANY($1)"))
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find bin records", e))
    }

    /// Records put before `cutoff`, oldest first.
    pub async fn find_put_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<BinRecord>> {
        sqlx::query_as::<_, BinRecord>(&format!(
            "SELECT {COLUMNS} FROM bin WHERE put_at < $1 ORDER BY put_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find expired bin records", e))
    }

    /// Insert a record inside a transaction.
    pub async fn insert(conn: &mut PgConnection, record: &BinRecord) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bin ({COLUMNS}) VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(record.id)
        .bind(record.put_at)
        .bind(record.prev_parent_id)
        .bind(record.prev_share_id)
        .bind(record.prev_name.as_deref())
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to insert bin record", e))?;
        Ok(())
    }

    /// Delete a record inside a transaction.
    pub async fn delete(conn: &mut PgConnection, id: EntryId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bin WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| store_error("Failed to delete bin record", e))?;
        expect_row(result.rows_affected(), || format!("Bin record {id}"))
    }
}
