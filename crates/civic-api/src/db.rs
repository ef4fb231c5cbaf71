//! # SQLite Persistence
//!
//! Optional. When `DATABASE_URL` is set, storage records are kept in a single
//! `records` table keyed by id and entity table; the body column holds the
//! storage form as JSON text, so sensitive fields only ever reach the
//! database as envelopes. Without it the API keeps records in memory.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use civic_fields::Record;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

/// Connect to `url` (creating the file if needed) and apply migrations.
pub async fn init_pool(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_with(options)
        .await?;
    tracing::info!("Connected to SQLite");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

fn decode_body(body: &str) -> Result<Record, sqlx::Error> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, "stored record body is not a JSON object");
        sqlx::Error::Decode(Box::new(e))
    })
}

/// Insert one storage record.
pub async fn insert(
    pool: &SqlitePool,
    table: &str,
    id: Uuid,
    body: &Record,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let body = serde_json::to_string(body).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query("INSERT INTO records (id, entity_table, body, created_at) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(table)
        .bind(body)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetch one storage record of `table` by id.
pub async fn get_by_id(pool: &SqlitePool, table: &str, id: Uuid) -> Result<Option<Record>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT body FROM records WHERE id = ? AND entity_table = ?",
    )
    .bind(id.to_string())
    .bind(table)
    .fetch_optional(pool)
    .await?;

    row.map(|(body,)| decode_body(&body)).transpose()
}

/// All storage records of `table`, oldest first.
pub async fn list(pool: &SqlitePool, table: &str) -> Result<Vec<Record>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT body FROM records WHERE entity_table = ? ORDER BY created_at, id",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|(body,)| decode_body(body)).collect()
}
