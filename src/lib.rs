//! Offline-first sync engine for task data.
//!
//! Records live in a local SQLite store and are always written locally
//! first; a durable outbox carries unconfirmed mutations to the server,
//! and a cursor-based pull brings down everything other devices changed.
//! The [`SyncOrchestrator`] drives pull-then-push cycles whenever the
//! app comes to the foreground, connectivity returns, or the periodic
//! timer fires.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    ChangeEvent, ChangeKind, ConnectivityMonitor, CursorStore, LocalStore, ManualConnectivity,
    MutationWriter, OutboxQueue, RemoteAuthority,
};
pub use application::services::{
    BackoffPolicy, PushOutcome, SyncEngine, SyncOrchestrator, SyncState, SyncStatusSnapshot,
};
pub use domain::entities::{
    Changeset, FailureDisposition, LocalRecord, OutboxEntry, PullRequest, PullResponse,
    RemoteRecord,
};
pub use domain::value_objects::{
    Cursor, MutationKind, OutboxStatus, RecordId, RecordSyncStatus, TableName,
};
pub use infrastructure::database::Database;
pub use infrastructure::remote::HttpRemoteAuthority;
pub use infrastructure::store::{SqliteLocalStore, SqliteMutationWriter, SqliteOutbox};
pub use shared::config::{CascadeRule, SyncConfig};
pub use shared::error::{Result, SyncError};

/// Installs the tracing subscriber, honoring `RUST_LOG`. Safe to call more
/// than once; later calls are ignored.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
