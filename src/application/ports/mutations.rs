use crate::domain::entities::LocalRecord;
use crate::domain::value_objects::{RecordId, TableName};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The UI-facing write surface. Every mutation commits the record write and
/// the matching outbox entry in one local transaction, so a record is never
/// dirty without a queue entry nor queued without the write having happened.
#[async_trait]
pub trait MutationWriter: Send + Sync {
    async fn create_record(&self, table: &TableName, fields: Value) -> Result<LocalRecord>;

    async fn update_record(
        &self,
        table: &TableName,
        id: &RecordId,
        patch: Value,
    ) -> Result<LocalRecord>;

    /// Soft-deletes a synced record and queues the delete; a record that
    /// never reached the server is removed outright and its pending create
    /// cancelled.
    async fn delete_record(&self, table: &TableName, id: &RecordId) -> Result<()>;
}
