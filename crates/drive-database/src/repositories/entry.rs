//! Entry repository implementation.

use sqlx::{PgConnection, PgPool};

use drive_core::result::AppResult;
use drive_core::types::{EntryId, UserId};
use drive_entity::entry::{Entry, EntryPatch, ListFilter};

use super::{expect_row, store_error};

const COLUMNS: &str = "id, owner_id, parent_id, share_id, is_directory, size, name, modified_at";

/// Repository for entry reads, tree queries, and transactional writes.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: PgPool,
}

impl EntryRepository {
    /// Create a new entry repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an entry by ID.
    pub async fn find_by_id(&self, id: EntryId) -> AppResult<Option<Entry>> {
        sqlx::query_as::<_, Entry>(&format!("SELECT {COLUMNS} FROM entries WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find entry", e))
    }

    /// Find every existing entry among `ids`.
    pub async fn find_by_ids(&self, ids: &[EntryId]) -> AppResult<Vec<Entry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Entry>(&format!(
            "SELECT {COLUMNS} FROM entries WHERE id = ANY($1) \
             ORDER BY is_directory DESC, name ASC"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find entries", e))
    }

    /// List direct children of a directory.
    pub async fn find_children(&self, parent_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(&format!(
            "SELECT {COLUMNS} FROM entries \
             WHERE parent_id = $1 AND ($2::BOOLEAN IS NULL OR is_directory = $2) \
             ORDER BY is_directory DESC, name ASC"
        ))
        .bind(parent_id)
        .bind(filter.is_directory())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list children", e))
    }

    /// Recursive query to get all descendants of a directory.
    ///
    /// The walk always descends through every directory; the filter only
    /// applies to what is returned.
    pub async fn find_descendants(
        &self,
        root_id: EntryId,
        filter: ListFilter,
    ) -> AppResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(&format!(
            "WITH RECURSIVE tree AS ( \
                SELECT {COLUMNS}, 1 AS depth FROM entries WHERE parent_id = $1 \
                UNION ALL \
                SELECT e.id, e.owner_id, e.parent_id, e.share_id, e.is_directory, e.size, \
                       e.name, e.modified_at, t.depth + 1 \
                FROM entries e INNER JOIN tree t ON e.parent_id = t.id \
             ) SELECT {COLUMNS} FROM tree \
             WHERE $2::BOOLEAN IS NULL OR is_directory = $2 \
             ORDER BY depth ASC, is_directory DESC, name ASC"
        ))
        .bind(root_id)
        .bind(filter.is_directory())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list descendants", e))
    }

    /// Get the chain from an entry up to its root, entry first.
    pub async fn find_ancestors(&self, id: EntryId) -> AppResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(&format!(
            "WITH RECURSIVE ancestors AS ( \
                SELECT {COLUMNS}, 0 AS depth FROM entries WHERE id = $1 \
                UNION ALL \
                SELECT e.id, e.owner_id, e.parent_id, e.share_id, e.is_directory, e.size, \
                       e.name, e.modified_at, a.depth + 1 \
                FROM entries e INNER JOIN ancestors a ON e.id = a.parent_id \
             ) SELECT {COLUMNS} FROM ancestors ORDER BY depth ASC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find ancestors", e))
    }

    /// Names among `names` already taken by siblings of the given kind.
    pub async fn find_sibling_names(
        &self,
        parent_id: EntryId,
        is_directory: bool,
        names: &[String],
    ) -> AppResult<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM entries \
             WHERE parent_id = $1 AND is_directory = $2 AND name = ANY($3) \
             ORDER BY name ASC",
        )
        .bind(parent_id)
        .bind(is_directory)
        .bind(names.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to check sibling names", e))
    }

    /// Roots of shares that list `user_id`, excluding the user's own entries.
    ///
    /// A root is an entry whose parent does not carry the same share.
    pub async fn find_shared_roots(&self, user_id: UserId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(
            "SELECT e.id, e.owner_id, e.parent_id, e.share_id, e.is_directory, e.size, \
                    e.name, e.modified_at \
             FROM entries e \
             INNER JOIN shares s ON s.id = e.share_id \
             LEFT JOIN entries p ON p.id = e.parent_id \
             WHERE ($1 = ANY(s.can_read_users) OR $1 = ANY(s.can_edit_users)) \
               AND e.owner_id <> $1 \
               AND (p.id IS NULL OR p.share_id IS DISTINCT FROM e.share_id) \
               AND ($2::BOOLEAN IS NULL OR e.is_directory = $2) \
             ORDER BY e.is_directory DESC, e.name ASC",
        )
        .bind(user_id)
        .bind(filter.is_directory())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list shared entries", e))
    }

    /// Insert an entry inside a transaction.
    pub async fn insert(conn: &mut PgConnection, entry: &Entry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO entries \
             (id, owner_id, parent_id, share_id, is_directory, size, name, modified_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(entry.parent_id)
        .bind(entry.share_id)
        .bind(entry.is_directory)
        .bind(entry.size)
        .bind(&entry.name)
        .bind(entry.modified_at)
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to insert entry", e))?;
        Ok(())
    }

    /// Apply a partial update inside a transaction.
    pub async fn update(conn: &mut PgConnection, patch: &EntryPatch) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE entries SET \
                parent_id = COALESCE($2, parent_id), \
                name = COALESCE($3, name), \
                share_id = CASE WHEN $4 THEN $5 ELSE share_id END, \
                modified_at = CASE WHEN $6 THEN NOW() ELSE modified_at END \
             WHERE id = $1",
        )
        .bind(patch.id)
        .bind(patch.parent_id)
        .bind(patch.name.as_deref())
        .bind(patch.share_id.is_some())
        .bind(patch.share_id.flatten())
        .bind(patch.relocates())
        .execute(conn)
        .await
        .map_err(|e| store_error("Failed to update entry", e))?;
        expect_row(result.rows_affected(), || format!("Entry {}", patch.id))
    }

    /// Delete a childless entry inside a transaction.
    pub async fn delete(conn: &mut PgConnection, id: EntryId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| store_error("Failed to delete entry", e))?;
        expect_row(result.rows_affected(), || format!("Entry {id}"))
    }
}
