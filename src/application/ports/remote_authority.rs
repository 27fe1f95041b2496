use crate::domain::entities::{PullResponse, RemoteRecord};
use crate::domain::value_objects::{Cursor, RecordId, TableName};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The server of record, seen through its sync contract only. The engine
/// requires nothing beyond an authenticated channel; token issuance and the
/// server's storage engine are out of scope.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Fetches the changes visible to this actor since `cursor`.
    async fn pull(&self, cursor: Cursor) -> Result<PullResponse>;

    /// Submits a locally created record; the response carries the canonical
    /// server identity and timestamps.
    async fn create_record(&self, table: &TableName, payload: &Value) -> Result<RemoteRecord>;

    async fn update_record(
        &self,
        table: &TableName,
        id: &RecordId,
        payload: &Value,
    ) -> Result<RemoteRecord>;

    /// Deletes by id. Implementations surface a missing record as
    /// `SyncError::NotFound`; the push path treats that as success.
    async fn delete_record(&self, table: &TableName, id: &RecordId) -> Result<()>;
}
