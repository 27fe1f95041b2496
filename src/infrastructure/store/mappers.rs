use crate::domain::entities::{LocalRecord, OutboxEntry};
use crate::domain::value_objects::{
    MutationKind, OutboxStatus, RecordId, RecordSyncStatus, TableName,
};
use crate::infrastructure::store::rows::{OutboxRow, RecordRow};
use crate::shared::error::{Result, SyncError};

pub fn record_from_row(row: RecordRow) -> Result<LocalRecord> {
    let table = TableName::new(row.table_name).map_err(SyncError::Storage)?;
    let id = RecordId::new(row.id).map_err(SyncError::Storage)?;
    let payload = serde_json::from_str(&row.payload)?;
    Ok(LocalRecord {
        table,
        id,
        payload,
        created_at: row.created_at,
        updated_at: row.updated_at,
        is_dirty: row.is_dirty,
        sync_status: RecordSyncStatus::from(row.sync_status.as_str()),
    })
}

pub fn outbox_entry_from_row(row: OutboxRow) -> Result<OutboxEntry> {
    let table = TableName::new(row.table_name).map_err(SyncError::Storage)?;
    let record_id = RecordId::new(row.record_id).map_err(SyncError::Storage)?;
    let action = MutationKind::parse(&row.action).map_err(SyncError::Storage)?;
    let payload = match row.payload {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };
    Ok(OutboxEntry {
        id: row.id,
        seq: row.seq,
        action,
        table,
        record_id,
        payload,
        status: OutboxStatus::from(row.status.as_str()),
        retry_count: row.retry_count.max(0) as u32,
        last_retry_at: row.last_retry_at,
        next_retry_at: row.next_retry_at,
        error_message: row.error_message,
        created_at: row.created_at,
    })
}
