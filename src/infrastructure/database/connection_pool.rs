use crate::shared::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Pool, Sqlite};

pub struct Database;

impl Database {
    /// Opens (or creates) the client database and bootstraps the sync schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Pool<Sqlite>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        initialize_schema(&pool).await?;
        Ok(pool)
    }
}

/// Idempotent schema bootstrap. Records of every entity type share one
/// physical table keyed by `(table_name, id)`; the outbox and the cursor
/// live beside them so sync state survives restarts.
pub async fn initialize_schema(pool: &Pool<Sqlite>) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            table_name TEXT NOT NULL,
            id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_dirty INTEGER NOT NULL DEFAULT 0,
            sync_status TEXT NOT NULL,
            PRIMARY KEY (table_name, id)
        )
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_records_dirty
            ON records (table_name, is_dirty)
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS outbox (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            action TEXT NOT NULL,
            table_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            payload TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_retry_at INTEGER,
            next_retry_at INTEGER,
            error_message TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_outbox_status
            ON outbox (status, seq)
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_outbox_record
            ON outbox (table_name, record_id)
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .await?;

    Ok(())
}
