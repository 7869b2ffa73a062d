//! Drive schema: `users`, `entries`, `shares` and `bin`.

use sqlx::PgPool;
use tracing::info;

use drive_core::error::{AppError, ErrorKind};
use drive_core::result::AppResult;

/// Applies every migration under `migrations/` not yet recorded in the database.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(
        known = migrator.iter().count(),
        "Bringing the drive schema up to date"
    );

    migrator.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::StorageFailure,
            format!("Drive schema migration failed: {e}"),
            e,
        )
    })?;

    info!("Drive schema is current");
    Ok(())
}
