//! Model record database operations

use chrono::{DateTime, Utc};
use morg_common::db::{ModelRecord, NewModelRecord};
use morg_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str =
    "SELECT id, creator, model, file_type, filename, original_filename, created_at FROM model_records";

/// Validate and insert a record, returning its new id
pub async fn insert(pool: &SqlitePool, record: &NewModelRecord) -> Result<i64> {
    let record = record.clone().validate()?;
    let created_at = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO model_records (creator, model, file_type, filename, original_filename, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.creator)
    .bind(&record.model)
    .bind(&record.file_type)
    .bind(&record.filename)
    .bind(&record.original_filename)
    .bind(&created_at)
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    let id = result.last_insert_rowid();
    tracing::info!(
        id,
        creator = %record.creator,
        filename = %record.filename,
        "Model record created"
    );
    Ok(id)
}

/// All records, oldest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<ModelRecord>> {
    let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    rows.iter().map(row_to_record).collect()
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<ModelRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)?;

    row.as_ref().map(row_to_record).transpose()
}

/// Delete by id; `false` when no such record existed
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM model_records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

    let removed = result.rows_affected() > 0;
    if removed {
        tracing::info!(id, "Model record deleted");
    } else {
        tracing::debug!(id, "Delete requested for unknown model record");
    }
    Ok(removed)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_records")
        .fetch_one(pool)
        .await
        .map_err(Error::Database)?;
    Ok(count)
}

fn row_to_record(row: &SqliteRow) -> Result<ModelRecord> {
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Invalid created_at '{}': {}", created_at, e)))?
        .with_timezone(&Utc);

    Ok(ModelRecord {
        id: row.get("id"),
        creator: row.get("creator"),
        model: row.get("model"),
        file_type: row.get("file_type"),
        filename: row.get("filename"),
        original_filename: row.get("original_filename"),
        created_at,
    })
}
