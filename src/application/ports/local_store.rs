use crate::domain::entities::{Changeset, LocalRecord, RemoteRecord};
use crate::domain::value_objects::{Cursor, RecordId, TableName};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Kind of change a committed store mutation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Emitted on the store's broadcast channel after a commit. The UI layer
/// subscribes to refresh its observable collections; the sync engine itself
/// does not depend on it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: TableName,
    pub id: RecordId,
    pub kind: ChangeKind,
}

/// Durable, queryable storage of records on the client.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Inserts a new record. Assigns a local id when `fields` carries none,
    /// marks it `created` and dirty, stamps both timestamps to now.
    async fn create(&self, table: &TableName, fields: Value) -> Result<LocalRecord>;

    /// Merges `patch` into the record's payload, bumps `updated_at`, marks it
    /// dirty; a `synced` record becomes `updated`, otherwise the lifecycle
    /// marker is unchanged. `NotFound` if the id is absent.
    async fn update(&self, table: &TableName, id: &RecordId, patch: Value) -> Result<LocalRecord>;

    /// Marks the record `deleted` but keeps the row for tombstone propagation.
    async fn soft_delete(&self, table: &TableName, id: &RecordId) -> Result<()>;

    /// Physically removes the row (and cascaded children). Used once a delete
    /// is confirmed remotely, or for records that were never synced.
    async fn hard_delete(&self, table: &TableName, id: &RecordId) -> Result<()>;

    /// Atomically destroys the local row and recreates it under the
    /// server-confirmed identity with `sync_status = synced`. References from
    /// cascade-configured child tables are re-keyed to the new id.
    async fn replace(
        &self,
        table: &TableName,
        id: &RecordId,
        remote: &RemoteRecord,
    ) -> Result<LocalRecord>;

    /// Applies a server-confirmed state to an existing record: payload and
    /// timestamps from the response, `synced`, clean.
    async fn mark_record_synced(
        &self,
        table: &TableName,
        id: &RecordId,
        remote: &RemoteRecord,
    ) -> Result<()>;

    /// Applies one table's pull changeset in a single transaction: upserts
    /// created/updated as synced and clean, hard-deletes tombstoned ids with
    /// cascade. Idempotent; re-applying the same changeset is a no-op.
    async fn apply_remote_changes(&self, table: &TableName, changes: &Changeset) -> Result<()>;

    async fn get(&self, table: &TableName, id: &RecordId) -> Result<Option<LocalRecord>>;

    async fn list_dirty(&self, table: &TableName) -> Result<Vec<LocalRecord>>;
}

/// Durable home of the pull cursor; must survive process restarts.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load_cursor(&self) -> Result<Cursor>;

    /// Persists the cursor. Implementations never move it backwards.
    async fn store_cursor(&self, cursor: Cursor) -> Result<()>;
}
