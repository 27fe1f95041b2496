#![allow(dead_code)]

pub mod remote;

use remote::InMemoryRemote;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tasklane::infrastructure::database::initialize_schema;
use tasklane::{
    BackoffPolicy, CursorStore, LocalStore, OutboxQueue, RecordId, RemoteAuthority,
    SqliteLocalStore, SqliteMutationWriter, SqliteOutbox, SyncConfig, SyncEngine, TableName,
};

/// Fully wired engine over an in-memory database and the in-process server
/// stand-in.
pub struct TestEnv {
    pub store: Arc<SqliteLocalStore>,
    pub outbox: Arc<SqliteOutbox>,
    pub writer: SqliteMutationWriter,
    pub remote: Arc<InMemoryRemote>,
    pub engine: Arc<SyncEngine>,
    pub config: SyncConfig,
}

impl TestEnv {
    /// Pull then push, the normal cycle order.
    pub async fn sync_cycle(&self) {
        self.engine.pull_once().await.expect("pull failed");
        self.engine.push_once().await.expect("push failed");
    }
}

/// Short deterministic backoff so retry scenarios run in test time.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        backoff_base_ms: 1,
        backoff_cap_ms: 10,
        backoff_jitter_ratio: 0.0,
        ..SyncConfig::default()
    }
}

pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    initialize_schema(&pool).await.expect("schema bootstrap");
    pool
}

pub async fn setup_env() -> TestEnv {
    env_over_pool(memory_pool().await).await
}

pub async fn env_over_pool(pool: Pool<Sqlite>) -> TestEnv {
    let config = test_config();
    let store = Arc::new(SqliteLocalStore::new(pool.clone(), config.cascades.clone()));
    let outbox = Arc::new(SqliteOutbox::new(
        pool,
        BackoffPolicy::from_config(&config),
        config.max_retry,
    ));
    let writer = SqliteMutationWriter::new(store.clone());
    let remote = Arc::new(InMemoryRemote::new());
    let engine = Arc::new(SyncEngine::new(
        store.clone() as Arc<dyn LocalStore>,
        store.clone() as Arc<dyn CursorStore>,
        outbox.clone() as Arc<dyn OutboxQueue>,
        remote.clone() as Arc<dyn RemoteAuthority>,
        config.clone(),
    ));
    TestEnv {
        store,
        outbox,
        writer,
        remote,
        engine,
        config,
    }
}

pub fn tasks() -> TableName {
    TableName::new("tasks".into()).unwrap()
}

pub fn projects() -> TableName {
    TableName::new("projects".into()).unwrap()
}

pub fn rid(s: &str) -> RecordId {
    RecordId::new(s.into()).unwrap()
}
