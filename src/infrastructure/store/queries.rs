//! Shared record/outbox SQL, written against a bare connection so the
//! mutation writer can run a record write and its outbox enqueue inside one
//! transaction.

use crate::domain::entities::{LocalRecord, OutboxEntry, RemoteRecord};
use crate::domain::value_objects::{MutationKind, RecordId, RecordSyncStatus, TableName};
use crate::infrastructure::store::mappers::{outbox_entry_from_row, record_from_row};
use crate::infrastructure::store::rows::{OutboxRow, RecordRow};
use crate::shared::config::CascadeRule;
use crate::shared::error::{Result, SyncError};
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use uuid::Uuid;

pub(crate) async fn fetch_record(
    conn: &mut SqliteConnection,
    table: &TableName,
    id: &RecordId,
) -> Result<Option<LocalRecord>> {
    let row = sqlx::query_as::<_, RecordRow>(
        "SELECT * FROM records WHERE table_name = ?1 AND id = ?2",
    )
    .bind(table.as_str())
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    row.map(record_from_row).transpose()
}

pub(crate) async fn create_record(
    conn: &mut SqliteConnection,
    table: &TableName,
    fields: Value,
    now_ms: i64,
) -> Result<LocalRecord> {
    let mut map = match fields {
        Value::Object(map) => map,
        _ => {
            return Err(SyncError::InvalidInput(
                "Record fields must be a JSON object".to_string(),
            ))
        }
    };
    let id = match map.remove("id") {
        Some(Value::String(value)) => RecordId::new(value).map_err(SyncError::InvalidInput)?,
        Some(_) => {
            return Err(SyncError::InvalidInput(
                "Record id must be a string".to_string(),
            ))
        }
        None => RecordId::new_local(),
    };
    let payload = Value::Object(map);

    sqlx::query(
        r#"
        INSERT INTO records (table_name, id, payload, created_at, updated_at, is_dirty, sync_status)
        VALUES (?1, ?2, ?3, ?4, ?4, 1, 'created')
        "#,
    )
    .bind(table.as_str())
    .bind(id.as_str())
    .bind(serde_json::to_string(&payload)?)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;

    Ok(LocalRecord {
        table: table.clone(),
        id,
        payload,
        created_at: now_ms,
        updated_at: now_ms,
        is_dirty: true,
        sync_status: RecordSyncStatus::Created,
    })
}

pub(crate) async fn update_record(
    conn: &mut SqliteConnection,
    table: &TableName,
    id: &RecordId,
    patch: Value,
    now_ms: i64,
) -> Result<LocalRecord> {
    let patch = match patch {
        Value::Object(map) => map,
        _ => {
            return Err(SyncError::InvalidInput(
                "Record patch must be a JSON object".to_string(),
            ))
        }
    };
    let mut record = fetch_record(&mut *conn, table, id)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("{table}/{id}")))?;
    if record.sync_status == RecordSyncStatus::Deleted {
        return Err(SyncError::NotFound(format!("{table}/{id}")));
    }

    let mut fields = match record.payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    for (key, value) in patch {
        fields.insert(key, value);
    }
    record.payload = Value::Object(fields);
    // updated_at never moves backwards, even under clock adjustment.
    record.updated_at = now_ms.max(record.updated_at).max(record.created_at);
    record.is_dirty = true;
    if record.sync_status == RecordSyncStatus::Synced {
        record.sync_status = RecordSyncStatus::Updated;
    }

    sqlx::query(
        r#"
        UPDATE records
        SET payload = ?3, updated_at = ?4, is_dirty = 1, sync_status = ?5
        WHERE table_name = ?1 AND id = ?2
        "#,
    )
    .bind(table.as_str())
    .bind(id.as_str())
    .bind(serde_json::to_string(&record.payload)?)
    .bind(record.updated_at)
    .bind(record.sync_status.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

pub(crate) async fn soft_delete(
    conn: &mut SqliteConnection,
    table: &TableName,
    id: &RecordId,
    now_ms: i64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET sync_status = 'deleted', is_dirty = 1, updated_at = MAX(updated_at, ?3)
        WHERE table_name = ?1 AND id = ?2
        "#,
    )
    .bind(table.as_str())
    .bind(id.as_str())
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SyncError::NotFound(format!("{table}/{id}")));
    }
    Ok(())
}

/// Hard-deletes a record and, via the configured cascade rules, every child
/// record referencing it. Returns the `(table, id)` pairs removed.
pub(crate) async fn hard_delete_cascading(
    conn: &mut SqliteConnection,
    cascades: &[CascadeRule],
    table: &TableName,
    id: &RecordId,
) -> Result<Vec<(String, String)>> {
    let mut removed = Vec::new();
    let mut worklist = vec![(table.to_string(), id.to_string())];

    while let Some((current_table, current_id)) = worklist.pop() {
        for rule in cascades.iter().filter(|r| r.parent_table == current_table) {
            let child_ids: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT id FROM records
                WHERE table_name = ?1 AND json_extract(payload, '$.' || ?2) = ?3
                "#,
            )
            .bind(&rule.child_table)
            .bind(&rule.foreign_key)
            .bind(&current_id)
            .fetch_all(&mut *conn)
            .await?;
            for (child_id,) in child_ids {
                worklist.push((rule.child_table.clone(), child_id));
            }
        }

        let result = sqlx::query("DELETE FROM records WHERE table_name = ?1 AND id = ?2")
            .bind(&current_table)
            .bind(&current_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() > 0 {
            removed.push((current_table, current_id));
        }
    }

    Ok(removed)
}

/// Upserts a server-shipped record as synced and clean. Unconditional:
/// whole-record last-writer-wins, with any still-unconfirmed local intent
/// preserved in the outbox rather than in the row.
pub(crate) async fn upsert_remote(
    conn: &mut SqliteConnection,
    table: &TableName,
    remote: &RemoteRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO records (table_name, id, payload, created_at, updated_at, is_dirty, sync_status)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, 'synced')
        ON CONFLICT(table_name, id) DO UPDATE SET
            payload = excluded.payload,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            is_dirty = 0,
            sync_status = 'synced'
        "#,
    )
    .bind(table.as_str())
    .bind(remote.id.as_str())
    .bind(serde_json::to_string(&remote.fields_value())?)
    .bind(remote.created_at)
    .bind(remote.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn mark_synced(
    conn: &mut SqliteConnection,
    table: &TableName,
    id: &RecordId,
    remote: &RemoteRecord,
) -> Result<()> {
    // A locally soft-deleted record keeps its tombstone; the queued delete
    // will settle it.
    sqlx::query(
        r#"
        UPDATE records
        SET payload = ?3, created_at = ?4, updated_at = ?5, is_dirty = 0, sync_status = 'synced'
        WHERE table_name = ?1 AND id = ?2 AND sync_status != 'deleted'
        "#,
    )
    .bind(table.as_str())
    .bind(id.as_str())
    .bind(serde_json::to_string(&remote.fields_value())?)
    .bind(remote.created_at)
    .bind(remote.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Points child records at a record's new server-assigned id. Queued outbox
/// payloads referencing the old id are rewritten too, so a child create that
/// has not been pushed yet goes out with the canonical parent id.
pub(crate) async fn rekey_children(
    conn: &mut SqliteConnection,
    cascades: &[CascadeRule],
    table: &TableName,
    old_id: &RecordId,
    new_id: &RecordId,
) -> Result<()> {
    for rule in cascades.iter().filter(|r| r.parent_table == table.as_str()) {
        sqlx::query(
            r#"
            UPDATE records
            SET payload = json_set(payload, '$.' || ?2, ?4)
            WHERE table_name = ?1 AND json_extract(payload, '$.' || ?2) = ?3
            "#,
        )
        .bind(&rule.child_table)
        .bind(&rule.foreign_key)
        .bind(old_id.as_str())
        .bind(new_id.as_str())
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE outbox
            SET payload = json_set(payload, '$.' || ?2, ?4)
            WHERE table_name = ?1 AND status IN ('pending', 'failed')
              AND json_extract(payload, '$.' || ?2) = ?3
            "#,
        )
        .bind(&rule.child_table)
        .bind(&rule.foreign_key)
        .bind(old_id.as_str())
        .bind(new_id.as_str())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Appends an outbox entry with coalescing:
/// - a create/update over an existing pending/failed entry for the same
///   record replaces that entry's payload and re-arms it;
/// - a delete over a pending create cancels the whole queue for the record
///   (the server never heard of it);
/// - a delete over a pending update turns that entry into a delete;
/// - a delete over an existing delete re-arms that entry instead of
///   queueing a second one.
///
/// Returns the resulting entry id, or `None` when the mutation cancelled out.
pub(crate) async fn enqueue(
    conn: &mut SqliteConnection,
    action: MutationKind,
    table: &TableName,
    record_id: &RecordId,
    payload: Option<&Value>,
    now_ms: i64,
) -> Result<Option<String>> {
    let existing = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT * FROM outbox
        WHERE table_name = ?1 AND record_id = ?2 AND status IN ('pending', 'failed')
        ORDER BY seq ASC
        "#,
    )
    .bind(table.as_str())
    .bind(record_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let payload_text = payload.map(serde_json::to_string).transpose()?;

    match action {
        MutationKind::Create | MutationKind::Update => {
            let target = existing
                .iter()
                .find(|row| row.action == "create" || row.action == "update");
            if let Some(row) = target {
                // Folding a later edit into a pending create keeps the entry
                // a create; the server must still see the record born.
                sqlx::query(
                    r#"
                    UPDATE outbox
                    SET payload = ?2, status = 'pending', retry_count = 0,
                        last_retry_at = NULL, next_retry_at = NULL, error_message = NULL
                    WHERE id = ?1
                    "#,
                )
                .bind(&row.id)
                .bind(&payload_text)
                .execute(&mut *conn)
                .await?;
                return Ok(Some(row.id.clone()));
            }
            insert_entry(conn, action, table, record_id, payload_text, now_ms)
                .await
                .map(Some)
        }
        MutationKind::Delete => {
            if existing.iter().any(|row| row.action == "create") {
                sqlx::query(
                    r#"
                    DELETE FROM outbox
                    WHERE table_name = ?1 AND record_id = ?2 AND status IN ('pending', 'failed')
                    "#,
                )
                .bind(table.as_str())
                .bind(record_id.as_str())
                .execute(&mut *conn)
                .await?;
                return Ok(None);
            }
            if let Some(row) = existing.iter().find(|r| r.action == "delete") {
                // A repeated delete (UI double-tap) re-arms the entry that
                // already carries the intent instead of queueing a duplicate.
                sqlx::query(
                    r#"
                    UPDATE outbox
                    SET status = 'pending', retry_count = 0,
                        last_retry_at = NULL, next_retry_at = NULL, error_message = NULL
                    WHERE id = ?1
                    "#,
                )
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
                return Ok(Some(row.id.clone()));
            }
            if let Some(row) = existing.iter().find(|r| r.action == "update") {
                sqlx::query(
                    r#"
                    UPDATE outbox
                    SET action = 'delete', payload = NULL, status = 'pending', retry_count = 0,
                        last_retry_at = NULL, next_retry_at = NULL, error_message = NULL
                    WHERE id = ?1
                    "#,
                )
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
                return Ok(Some(row.id.clone()));
            }
            insert_entry(conn, action, table, record_id, None, now_ms)
                .await
                .map(Some)
        }
    }
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    action: MutationKind,
    table: &TableName,
    record_id: &RecordId,
    payload_text: Option<String>,
    now_ms: i64,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO outbox (id, action, table_name, record_id, payload, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
        "#,
    )
    .bind(&id)
    .bind(action.as_str())
    .bind(table.as_str())
    .bind(record_id.as_str())
    .bind(payload_text)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

pub(crate) async fn fetch_outbox_entry(
    conn: &mut SqliteConnection,
    entry_id: &str,
) -> Result<Option<OutboxEntry>> {
    let row = sqlx::query_as::<_, OutboxRow>("SELECT * FROM outbox WHERE id = ?1")
        .bind(entry_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(outbox_entry_from_row).transpose()
}
