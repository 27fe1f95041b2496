use crate::application::ports::local_store::{ChangeEvent, ChangeKind, CursorStore, LocalStore};
use crate::domain::entities::{Changeset, LocalRecord, RemoteRecord};
use crate::domain::value_objects::{Cursor, RecordId, TableName};
use crate::infrastructure::store::mappers::record_from_row;
use crate::infrastructure::store::queries;
use crate::infrastructure::store::rows::RecordRow;
use crate::shared::config::CascadeRule;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tokio::sync::broadcast;

const CURSOR_KEY: &str = "last_pulled_at";

/// SQLite-backed record store. One physical table holds every entity type;
/// committed mutations are announced on a broadcast channel the UI layer
/// subscribes to.
pub struct SqliteLocalStore {
    pool: Pool<Sqlite>,
    cascades: Vec<CascadeRule>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteLocalStore {
    pub fn new(pool: Pool<Sqlite>, cascades: Vec<CascadeRule>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            pool,
            cascades,
            changes,
        }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub(crate) fn cascades(&self) -> &[CascadeRule] {
        &self.cascades
    }

    /// Change feed for observable collections. Lossy when a subscriber lags.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn emit(&self, table: &TableName, id: &RecordId, kind: ChangeKind) {
        let _ = self.changes.send(ChangeEvent {
            table: table.clone(),
            id: id.clone(),
            kind,
        });
    }

    fn emit_removed(&self, removed: &[(String, String)]) {
        for (table, id) in removed {
            if let (Ok(table), Ok(id)) =
                (TableName::new(table.clone()), RecordId::new(id.clone()))
            {
                self.emit(&table, &id, ChangeKind::Deleted);
            }
        }
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn create(&self, table: &TableName, fields: serde_json::Value) -> Result<LocalRecord> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.pool.acquire().await?;
        let record = queries::create_record(&mut conn, table, fields, now).await?;
        self.emit(table, &record.id, ChangeKind::Created);
        Ok(record)
    }

    async fn update(
        &self,
        table: &TableName,
        id: &RecordId,
        patch: serde_json::Value,
    ) -> Result<LocalRecord> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.pool.acquire().await?;
        let record = queries::update_record(&mut conn, table, id, patch, now).await?;
        self.emit(table, id, ChangeKind::Updated);
        Ok(record)
    }

    async fn soft_delete(&self, table: &TableName, id: &RecordId) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.pool.acquire().await?;
        queries::soft_delete(&mut conn, table, id, now).await?;
        self.emit(table, id, ChangeKind::Deleted);
        Ok(())
    }

    async fn hard_delete(&self, table: &TableName, id: &RecordId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = queries::hard_delete_cascading(&mut tx, &self.cascades, table, id).await?;
        tx.commit().await?;
        self.emit_removed(&removed);
        Ok(())
    }

    async fn replace(
        &self,
        table: &TableName,
        id: &RecordId,
        remote: &RemoteRecord,
    ) -> Result<LocalRecord> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE table_name = ?1 AND id = ?2")
            .bind(table.as_str())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        queries::upsert_remote(&mut tx, table, remote).await?;
        if id != &remote.id {
            queries::rekey_children(&mut tx, &self.cascades, table, id, &remote.id).await?;
        }
        let record = queries::fetch_record(&mut tx, table, &remote.id)
            .await?
            .ok_or_else(|| SyncError::Internal(format!("replace lost {table}/{id}")))?;
        tx.commit().await?;

        if id != &remote.id {
            self.emit(table, id, ChangeKind::Deleted);
        }
        self.emit(table, &remote.id, ChangeKind::Updated);
        Ok(record)
    }

    async fn mark_record_synced(
        &self,
        table: &TableName,
        id: &RecordId,
        remote: &RemoteRecord,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        queries::mark_synced(&mut conn, table, id, remote).await?;
        self.emit(table, id, ChangeKind::Updated);
        Ok(())
    }

    async fn apply_remote_changes(&self, table: &TableName, changes: &Changeset) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for remote in changes.created.iter().chain(changes.updated.iter()) {
            queries::upsert_remote(&mut tx, table, remote).await?;
        }
        let mut removed = Vec::new();
        for id in &changes.deleted {
            removed.extend(queries::hard_delete_cascading(&mut tx, &self.cascades, table, id).await?);
        }
        tx.commit().await?;

        for remote in changes.created.iter().chain(changes.updated.iter()) {
            self.emit(table, &remote.id, ChangeKind::Updated);
        }
        self.emit_removed(&removed);
        Ok(())
    }

    async fn get(&self, table: &TableName, id: &RecordId) -> Result<Option<LocalRecord>> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_record(&mut conn, table, id).await
    }

    async fn list_dirty(&self, table: &TableName) -> Result<Vec<LocalRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE table_name = ?1 AND is_dirty = 1 ORDER BY created_at ASC",
        )
        .bind(table.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl CursorStore for SqliteLocalStore {
    async fn load_cursor(&self) -> Result<Cursor> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_state WHERE key = ?1")
                .bind(CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await?;
        match value {
            Some((raw,)) => {
                let millis = raw
                    .parse::<i64>()
                    .map_err(|_| SyncError::Storage(format!("corrupt cursor value '{raw}'")))?;
                Ok(Cursor::from_millis(millis))
            }
            None => Ok(Cursor::ZERO),
        }
    }

    async fn store_cursor(&self, cursor: Cursor) -> Result<()> {
        let current = self.load_cursor().await?;
        let next = current.advanced_to(cursor);
        sqlx::query(
            r#"
            INSERT INTO sync_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(CURSOR_KEY)
        .bind(next.millis().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
