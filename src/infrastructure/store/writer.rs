use crate::application::ports::local_store::ChangeKind;
use crate::application::ports::mutations::MutationWriter;
use crate::domain::entities::LocalRecord;
use crate::domain::value_objects::{MutationKind, RecordId, RecordSyncStatus, TableName};
use crate::infrastructure::store::queries;
use crate::infrastructure::store::sqlite_local_store::SqliteLocalStore;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Commits each record write together with its outbox entry in a single
/// SQLite transaction.
pub struct SqliteMutationWriter {
    store: Arc<SqliteLocalStore>,
}

impl SqliteMutationWriter {
    pub fn new(store: Arc<SqliteLocalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MutationWriter for SqliteMutationWriter {
    async fn create_record(&self, table: &TableName, fields: Value) -> Result<LocalRecord> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.store.pool().begin().await?;
        let record = queries::create_record(&mut tx, table, fields, now).await?;
        queries::enqueue(
            &mut tx,
            MutationKind::Create,
            table,
            &record.id,
            Some(&record.wire_payload()),
            now,
        )
        .await?;
        tx.commit().await?;

        self.store.emit(table, &record.id, ChangeKind::Created);
        Ok(record)
    }

    async fn update_record(
        &self,
        table: &TableName,
        id: &RecordId,
        patch: Value,
    ) -> Result<LocalRecord> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.store.pool().begin().await?;
        let record = queries::update_record(&mut tx, table, id, patch, now).await?;
        queries::enqueue(
            &mut tx,
            MutationKind::Update,
            table,
            id,
            Some(&record.wire_payload()),
            now,
        )
        .await?;
        tx.commit().await?;

        self.store.emit(table, id, ChangeKind::Updated);
        Ok(record)
    }

    async fn delete_record(&self, table: &TableName, id: &RecordId) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.store.pool().begin().await?;
        let record = queries::fetch_record(&mut tx, table, id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("{table}/{id}")))?;

        let removed = if record.sync_status == RecordSyncStatus::Created {
            // Never reached the server: drop the row and let the enqueue
            // cancel the pending create.
            let removed = queries::hard_delete_cascading(
                &mut tx,
                self.store.cascades(),
                table,
                id,
            )
            .await?;
            queries::enqueue(&mut tx, MutationKind::Delete, table, id, None, now).await?;
            removed
        } else {
            queries::soft_delete(&mut tx, table, id, now).await?;
            queries::enqueue(&mut tx, MutationKind::Delete, table, id, None, now).await?;
            vec![(table.to_string(), id.to_string())]
        };
        tx.commit().await?;

        for (table_name, record_id) in removed {
            if let (Ok(t), Ok(r)) = (TableName::new(table_name), RecordId::new(record_id)) {
                self.store.emit(&t, &r, ChangeKind::Deleted);
            }
        }
        Ok(())
    }
}
