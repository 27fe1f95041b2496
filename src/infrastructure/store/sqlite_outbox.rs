use crate::application::ports::outbox::OutboxQueue;
use crate::application::services::backoff::BackoffPolicy;
use crate::domain::entities::{FailureDisposition, OutboxEntry};
use crate::domain::value_objects::{MutationKind, RecordId, TableName};
use crate::infrastructure::store::mappers::outbox_entry_from_row;
use crate::infrastructure::store::queries;
use crate::infrastructure::store::rows::OutboxRow;
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Durable FIFO mutation queue over the `outbox` table. Entries survive
/// restarts; eligibility for dispatch is gated by `next_retry_at`.
pub struct SqliteOutbox {
    pool: Pool<Sqlite>,
    backoff: BackoffPolicy,
    max_retry: u32,
}

impl SqliteOutbox {
    pub fn new(pool: Pool<Sqlite>, backoff: BackoffPolicy, max_retry: u32) -> Self {
        Self {
            pool,
            backoff,
            max_retry,
        }
    }

    pub fn from_config(pool: Pool<Sqlite>, config: &SyncConfig) -> Self {
        Self::new(pool, BackoffPolicy::from_config(config), config.max_retry)
    }
}

#[async_trait]
impl OutboxQueue for SqliteOutbox {
    async fn enqueue(
        &self,
        action: MutationKind,
        table: &TableName,
        record_id: &RecordId,
        payload: Option<serde_json::Value>,
    ) -> Result<Option<OutboxEntry>> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        let entry_id =
            queries::enqueue(&mut tx, action, table, record_id, payload.as_ref(), now).await?;
        let entry = match entry_id {
            Some(id) => queries::fetch_outbox_entry(&mut tx, &id).await?,
            None => None,
        };
        tx.commit().await?;
        Ok(entry)
    }

    async fn next_batch(&self, max: u32, now_ms: i64) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT * FROM outbox
            WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= ?1)
            ORDER BY seq ASC
            LIMIT ?2
            "#,
        )
        .bind(now_ms)
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(outbox_entry_from_row).collect()
    }

    async fn mark_processing(&self, entry_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox SET status = 'processing' WHERE id = ?1 AND status = 'pending'",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::Storage(format!(
                "outbox entry {entry_id} is not pending"
            )));
        }
        Ok(())
    }

    async fn mark_completed(&self, entry_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM outbox WHERE id = ?1")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        entry_id: &str,
        reason: &str,
        permanent: bool,
    ) -> Result<FailureDisposition> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        let entry = queries::fetch_outbox_entry(&mut tx, entry_id)
            .await?
            .ok_or_else(|| SyncError::Storage(format!("outbox entry {entry_id} vanished")))?;

        let retries = entry.retry_count + 1;
        let disposition = if permanent || retries >= self.max_retry {
            sqlx::query(
                r#"
                UPDATE outbox
                SET status = 'failed', retry_count = ?2, last_retry_at = ?3,
                    next_retry_at = NULL, error_message = ?4
                WHERE id = ?1
                "#,
            )
            .bind(entry_id)
            .bind(retries as i64)
            .bind(now)
            .bind(reason)
            .execute(&mut *tx)
            .await?;
            FailureDisposition::Exhausted
        } else {
            let next_retry_at = self.backoff.next_retry_at(now, entry.retry_count);
            sqlx::query(
                r#"
                UPDATE outbox
                SET status = 'pending', retry_count = ?2, last_retry_at = ?3,
                    next_retry_at = ?4, error_message = ?5
                WHERE id = ?1
                "#,
            )
            .bind(entry_id)
            .bind(retries as i64)
            .bind(now)
            .bind(next_retry_at)
            .bind(reason)
            .execute(&mut *tx)
            .await?;
            FailureDisposition::Retry { next_retry_at }
        };
        tx.commit().await?;
        Ok(disposition)
    }

    async fn release(&self, entry_id: &str) -> Result<()> {
        sqlx::query("UPDATE outbox SET status = 'pending' WHERE id = ?1 AND status = 'processing'")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn discard_for_record(&self, table: &TableName, record_id: &RecordId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM outbox
            WHERE table_name = ?1 AND record_id = ?2 AND status IN ('pending', 'failed')
            "#,
        )
        .bind(table.as_str())
        .bind(record_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn failed_entries(&self) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT * FROM outbox WHERE status = 'failed' ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(outbox_entry_from_row).collect()
    }

    async fn pending_count(&self) -> Result<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM outbox WHERE status IN ('pending', 'processing')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OutboxStatus;
    use crate::infrastructure::database::initialize_schema;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_outbox() -> SqliteOutbox {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_schema(&pool).await.unwrap();
        // No jitter in tests so retry timestamps are exact.
        SqliteOutbox::new(pool, BackoffPolicy::new(1000, 60_000, 0.0), 3)
    }

    fn tasks() -> TableName {
        TableName::new("tasks".into()).unwrap()
    }

    fn rid(s: &str) -> RecordId {
        RecordId::new(s.into()).unwrap()
    }

    #[tokio::test]
    async fn entries_dispatch_in_enqueue_order() {
        let outbox = setup_outbox().await;
        outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({"n": 1})))
            .await
            .unwrap();
        outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("b"), Some(json!({"n": 2})))
            .await
            .unwrap();

        let batch = outbox.next_batch(10, i64::MAX).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].record_id, rid("a"));
        assert_eq!(batch[1].record_id, rid("b"));
        assert!(batch[0].seq < batch[1].seq);
    }

    #[tokio::test]
    async fn update_coalesces_into_pending_create() {
        let outbox = setup_outbox().await;
        let first = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({"title": "old"})))
            .await
            .unwrap()
            .unwrap();
        let second = outbox
            .enqueue(MutationKind::Update, &tasks(), &rid("a"), Some(json!({"title": "new"})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.action, MutationKind::Create);
        assert_eq!(second.payload, Some(json!({"title": "new"})));
        assert_eq!(outbox.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_cancels_unsynced_create() {
        let outbox = setup_outbox().await;
        outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap();
        let result = outbox
            .enqueue(MutationKind::Delete, &tasks(), &rid("a"), None)
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_supersedes_pending_update() {
        let outbox = setup_outbox().await;
        outbox
            .enqueue(MutationKind::Update, &tasks(), &rid("a"), Some(json!({"t": 1})))
            .await
            .unwrap();
        let entry = outbox
            .enqueue(MutationKind::Delete, &tasks(), &rid("a"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.action, MutationKind::Delete);
        assert_eq!(entry.payload, None);
        assert_eq!(outbox.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_delete_coalesces_into_one_entry() {
        let outbox = setup_outbox().await;
        let first = outbox
            .enqueue(MutationKind::Delete, &tasks(), &rid("a"), None)
            .await
            .unwrap()
            .unwrap();
        let second = outbox
            .enqueue(MutationKind::Delete, &tasks(), &rid("a"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.action, MutationKind::Delete);
        assert_eq!(outbox.pending_count().await.unwrap(), 1);

        // A parked delete is re-armed, not duplicated.
        outbox.mark_failed(&first.id, "boom", true).await.unwrap();
        let rearmed = outbox
            .enqueue(MutationKind::Delete, &tasks(), &rid("a"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rearmed.id, first.id);
        assert_eq!(rearmed.status, OutboxStatus::Pending);
        assert_eq!(rearmed.retry_count, 0);
        assert!(outbox.failed_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_entry_waits_out_its_backoff() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();

        outbox.mark_processing(&entry.id).await.unwrap();
        let disposition = outbox
            .mark_failed(&entry.id, "connection refused", false)
            .await
            .unwrap();
        let next_retry_at = match disposition {
            FailureDisposition::Retry { next_retry_at } => next_retry_at,
            FailureDisposition::Exhausted => panic!("first failure must not exhaust"),
        };

        assert!(outbox
            .next_batch(10, next_retry_at - 1)
            .await
            .unwrap()
            .is_empty());
        let ready = outbox.next_batch(10, next_retry_at).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].retry_count, 1);
        assert_eq!(ready[0].error_message.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn third_failure_exhausts_the_entry() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();

        for attempt in 1..=3u32 {
            let disposition = outbox.mark_failed(&entry.id, "boom", false).await.unwrap();
            match disposition {
                FailureDisposition::Retry { .. } => assert!(attempt < 3),
                FailureDisposition::Exhausted => assert_eq!(attempt, 3),
            }
        }

        let failed = outbox.failed_entries().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, OutboxStatus::Failed);
        assert_eq!(failed[0].retry_count, 3);
        assert!(outbox.next_batch(10, i64::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn permanent_failure_exhausts_immediately() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();

        let disposition = outbox
            .mark_failed(&entry.id, "422 unprocessable", true)
            .await
            .unwrap();
        assert!(matches!(disposition, FailureDisposition::Exhausted));
        assert_eq!(outbox.failed_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn release_returns_entry_to_pending() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();

        outbox.mark_processing(&entry.id).await.unwrap();
        assert!(outbox.next_batch(10, i64::MAX).await.unwrap().is_empty());

        outbox.release(&entry.id).await.unwrap();
        assert_eq!(outbox.next_batch(10, i64::MAX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn discard_drops_pending_and_failed_for_record() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Update, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();
        outbox.mark_failed(&entry.id, "boom", true).await.unwrap();
        outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("b"), Some(json!({})))
            .await
            .unwrap();

        outbox.discard_for_record(&tasks(), &rid("a")).await.unwrap();

        assert!(outbox.failed_entries().await.unwrap().is_empty());
        assert_eq!(outbox.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn completion_removes_the_entry() {
        let outbox = setup_outbox().await;
        let entry = outbox
            .enqueue(MutationKind::Create, &tasks(), &rid("a"), Some(json!({})))
            .await
            .unwrap()
            .unwrap();
        outbox.mark_processing(&entry.id).await.unwrap();
        outbox.mark_completed(&entry.id).await.unwrap();
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }
}
