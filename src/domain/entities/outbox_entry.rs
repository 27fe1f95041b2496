use crate::domain::value_objects::{MutationKind, OutboxStatus, RecordId, TableName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pending local mutation awaiting server confirmation.
///
/// Owned and mutated exclusively by the sync components; `seq` preserves
/// FIFO creation order so a create always reaches the server before any
/// update or delete targeting the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub seq: i64,
    pub action: MutationKind,
    pub table: TableName,
    pub record_id: RecordId,
    /// Whole-record payload for create/update; `None` for delete.
    pub payload: Option<Value>,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub last_retry_at: Option<i64>,
    /// When the entry becomes eligible again after a failure; `None` means
    /// immediately eligible.
    pub next_retry_at: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: i64,
}

/// What `mark_failed` decided about a failing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The entry went back to pending and becomes eligible at the given time.
    Retry { next_retry_at: i64 },
    /// Retries are exhausted (or the failure is permanent); the entry is
    /// `failed` and surfaced rather than silently retried.
    Exhausted,
}
