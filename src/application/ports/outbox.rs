use crate::domain::entities::{FailureDisposition, OutboxEntry};
use crate::domain::value_objects::{MutationKind, RecordId, TableName};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The durable queue of local mutations not yet confirmed by the server.
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Appends a pending entry, coalescing with an existing pending/failed
    /// entry for the same record: a second update replaces the payload, and a
    /// delete enqueued after a pending create for a never-synced record
    /// cancels the create instead (nothing to tell the server).
    ///
    /// Returns the entry, or `None` when the mutation cancelled out.
    async fn enqueue(
        &self,
        action: MutationKind,
        table: &TableName,
        record_id: &RecordId,
        payload: Option<Value>,
    ) -> Result<Option<OutboxEntry>>;

    /// Pending entries whose backoff window has elapsed as of `now_ms`,
    /// FIFO by creation order.
    async fn next_batch(&self, max: u32, now_ms: i64) -> Result<Vec<OutboxEntry>>;

    async fn mark_processing(&self, entry_id: &str) -> Result<()>;

    /// Confirms delivery; the entry is purged.
    async fn mark_completed(&self, entry_id: &str) -> Result<()>;

    /// Records a failure. Increments the retry counter and either schedules
    /// the entry back to pending with a backoff delay or, once the retry
    /// budget is spent (or `permanent` is set), parks it as `failed`.
    async fn mark_failed(
        &self,
        entry_id: &str,
        reason: &str,
        permanent: bool,
    ) -> Result<FailureDisposition>;

    /// Puts a processing entry back to pending without counting a retry.
    /// Used when a cycle aborts for reasons unrelated to the entry (auth
    /// pause, connectivity loss).
    async fn release(&self, entry_id: &str) -> Result<()>;

    /// Drops pending/failed entries targeting a record, e.g. when a remote
    /// tombstone makes a queued update moot.
    async fn discard_for_record(&self, table: &TableName, record_id: &RecordId) -> Result<()>;

    /// Entries parked as permanently failed, for the "needs attention" UI.
    async fn failed_entries(&self) -> Result<Vec<OutboxEntry>>;

    /// Number of entries still awaiting confirmation (pending + processing).
    async fn pending_count(&self) -> Result<u32>;
}
