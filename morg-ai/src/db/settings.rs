//! Settings database operations
//!
//! Key/value accessors for the `settings` table. Search and model API keys
//! set at runtime through `/api/settings/:key` live here.

use sqlx::{Pool, Sqlite};
use morg_common::{Error, Result};

/// Setting keys that may be written through the API
pub const SECRET_KEYS: [&str; 4] = [
    "google_api_key",
    "google_cse_id",
    "vertex_access_token",
    "gemini_api_key",
];

pub fn is_known_secret(key: &str) -> bool {
    SECRET_KEYS.contains(&key)
}

/// Read and parse a setting; `None` when absent
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Insert or replace a setting
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
