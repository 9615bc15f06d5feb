//! Database access for morg-ai

pub mod records;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the organizer database in the root folder
///
/// Creates the file and all tables when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!(path = %db_path.display(), "Connecting to database");
    let pool = morg_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (settings, model_records)");
    Ok(pool)
}

/// In-memory database with the full schema, for tests
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    morg_common::db::create_schema(&pool).await.unwrap();
    pool
}
