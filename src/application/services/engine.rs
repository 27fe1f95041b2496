use crate::application::ports::{CursorStore, LocalStore, OutboxQueue, RemoteAuthority};
use crate::domain::entities::{FailureDisposition, OutboxEntry};
use crate::domain::value_objects::{Cursor, MutationKind, TableName};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tally of one push pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    pub pushed: u32,
    pub retried: u32,
    /// Entries that became permanently failed during this pass.
    pub exhausted: u32,
}

/// The bidirectional sync client: pulls remote changes into the local store
/// and drains the outbox against the Remote Authority.
///
/// Owns its store, outbox and network handles explicitly; constructed once at
/// process start and shared by reference.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    cursors: Arc<dyn CursorStore>,
    outbox: Arc<dyn OutboxQueue>,
    remote: Arc<dyn RemoteAuthority>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        cursors: Arc<dyn CursorStore>,
        outbox: Arc<dyn OutboxQueue>,
        remote: Arc<dyn RemoteAuthority>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            cursors,
            outbox,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn pending_mutations(&self) -> Result<u32> {
        self.outbox.pending_count().await
    }

    /// Entries parked as permanently failed, counted from the durable queue
    /// so the tally survives restarts.
    pub async fn failed_mutations(&self) -> Result<u32> {
        Ok(self.outbox.failed_entries().await?.len() as u32)
    }

    /// One pull: fetch changes since the cursor, apply them table by table,
    /// then advance the cursor.
    ///
    /// Each table commits atomically; the first failing table aborts the rest
    /// and leaves the cursor untouched, so the same changes are redelivered
    /// on the next pull. Re-application is idempotent.
    pub async fn pull_once(&self) -> Result<Cursor> {
        let cursor = self.cursors.load_cursor().await?;
        let response = self.remote.pull(cursor).await?;

        for (name, changeset) in &response.changes {
            if changeset.is_empty() {
                continue;
            }
            changeset.validate().map_err(SyncError::InvalidInput)?;
            let table = TableName::new(name.clone()).map_err(SyncError::InvalidInput)?;

            self.store.apply_remote_changes(&table, changeset).await?;

            // A tombstone makes any queued mutation for that record moot.
            for id in &changeset.deleted {
                self.outbox.discard_for_record(&table, id).await?;
            }
            debug!(
                table = %table,
                created = changeset.created.len(),
                updated = changeset.updated.len(),
                deleted = changeset.deleted.len(),
                "applied pull changeset"
            );
        }

        let next = cursor.advanced_to(Cursor::from_millis(response.timestamp));
        self.cursors.store_cursor(next).await?;
        info!(cursor = next.millis(), "pull complete");
        Ok(next)
    }

    /// One push pass: drains up to `batch_size` eligible outbox entries in
    /// FIFO order. A failing entry only affects itself; the rest of the batch
    /// continues. An auth failure aborts the pass so the orchestrator can
    /// pause for re-authentication.
    ///
    /// Entries are claimed one at a time rather than snapshotted upfront:
    /// pushing a create can re-key references inside later queued payloads,
    /// and those must go out in their rewritten form.
    pub async fn push_once(&self) -> Result<PushOutcome> {
        let now = Utc::now().timestamp_millis();
        let mut outcome = PushOutcome::default();

        for _ in 0..self.config.batch_size {
            let Some(entry) = self.outbox.next_batch(1, now).await?.into_iter().next() else {
                break;
            };
            self.outbox.mark_processing(&entry.id).await?;
            match self.push_entry(&entry).await {
                Ok(()) => {
                    self.outbox.mark_completed(&entry.id).await?;
                    outcome.pushed += 1;
                }
                Err(err @ SyncError::Auth(_)) => {
                    // Not the entry's fault; put it back untouched.
                    self.outbox.release(&entry.id).await?;
                    return Err(err);
                }
                Err(err) => {
                    warn!(entry = %entry.id, action = entry.action.as_str(), error = %err, "push entry failed");
                    let disposition = self
                        .outbox
                        .mark_failed(&entry.id, &err.to_string(), err.is_permanent())
                        .await?;
                    match disposition {
                        FailureDisposition::Retry { .. } => outcome.retried += 1,
                        FailureDisposition::Exhausted => {
                            error!(
                                entry = %entry.id,
                                table = %entry.table,
                                record = %entry.record_id,
                                "mutation permanently failed; record needs attention"
                            );
                            outcome.exhausted += 1;
                        }
                    }
                }
            }
        }

        if outcome != PushOutcome::default() {
            info!(
                pushed = outcome.pushed,
                retried = outcome.retried,
                exhausted = outcome.exhausted,
                "push pass complete"
            );
        }
        Ok(outcome)
    }

    async fn push_entry(&self, entry: &OutboxEntry) -> Result<()> {
        match entry.action {
            MutationKind::Create => {
                let payload = entry.payload.as_ref().ok_or_else(|| {
                    SyncError::InvalidInput(format!("create entry {} has no payload", entry.id))
                })?;
                let remote = self.remote.create_record(&entry.table, payload).await?;
                // The placeholder gives way to the server-confirmed identity.
                self.store
                    .replace(&entry.table, &entry.record_id, &remote)
                    .await?;
                Ok(())
            }
            MutationKind::Update => {
                let payload = entry.payload.as_ref().ok_or_else(|| {
                    SyncError::InvalidInput(format!("update entry {} has no payload", entry.id))
                })?;
                match self
                    .remote
                    .update_record(&entry.table, &entry.record_id, payload)
                    .await
                {
                    Ok(remote) => {
                        self.store
                            .mark_record_synced(&entry.table, &entry.record_id, &remote)
                            .await
                    }
                    Err(SyncError::NotFound(_)) => {
                        // The record is gone server-side: delete wins.
                        self.store
                            .hard_delete(&entry.table, &entry.record_id)
                            .await
                    }
                    Err(SyncError::Conflict(msg)) => {
                        // Server holds the later write; the next pull carries
                        // the prevailing version. Last-writer-wins.
                        warn!(record = %entry.record_id, %msg, "update lost to a later server write");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            MutationKind::Delete => {
                match self
                    .remote
                    .delete_record(&entry.table, &entry.record_id)
                    .await
                {
                    // Already gone on the server counts as delivered.
                    Ok(()) | Err(SyncError::NotFound(_)) => {
                        self.store
                            .hard_delete(&entry.table, &entry.record_id)
                            .await
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}
