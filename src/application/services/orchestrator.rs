use crate::application::ports::ConnectivityMonitor;
use crate::application::services::engine::SyncEngine;
use crate::shared::error::SyncError;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Pulling,
    Pushing,
    Offline,
}

/// Observable sync status for the UI's non-blocking indicator.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSnapshot {
    pub state: SyncState,
    pub is_online: bool,
    pub pending_mutations: u32,
    pub failed_mutations: u32,
    pub last_sync_at: Option<i64>,
    pub sync_errors: u32,
    pub needs_reauth: bool,
}

impl SyncStatusSnapshot {
    fn initial(is_online: bool) -> Self {
        Self {
            state: if is_online {
                SyncState::Idle
            } else {
                SyncState::Offline
            },
            is_online,
            pending_mutations: 0,
            failed_mutations: 0,
            last_sync_at: None,
            sync_errors: 0,
            needs_reauth: false,
        }
    }
}

/// Schedules sync cycles off connectivity transitions, foreground events and
/// a periodic timer. At most one cycle runs at a time; triggers arriving
/// mid-cycle coalesce into a single re-run.
pub struct SyncOrchestrator {
    engine: Arc<SyncEngine>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    status: Arc<RwLock<SyncStatusSnapshot>>,
    in_flight: AtomicBool,
    rerun_requested: AtomicBool,
    paused_for_auth: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(engine: Arc<SyncEngine>, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        let online = connectivity.is_online();
        Self {
            engine,
            connectivity,
            status: Arc::new(RwLock::new(SyncStatusSnapshot::initial(online))),
            in_flight: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
            paused_for_auth: AtomicBool::new(false),
        }
    }

    /// Current status with fresh pending and failed counts. Both are read
    /// from the durable queue, so entries parked before a restart show up
    /// without waiting for a cycle.
    pub async fn status(&self) -> SyncStatusSnapshot {
        let mut snapshot = self.status.read().await.clone();
        snapshot.is_online = self.connectivity.is_online();
        if let Ok(pending) = self.engine.pending_mutations().await {
            snapshot.pending_mutations = pending;
        }
        if let Ok(failed) = self.engine.failed_mutations().await {
            snapshot.failed_mutations = failed;
        }
        snapshot
    }

    /// Requests a sync cycle. Returns immediately; if a cycle is already in
    /// flight the request coalesces into one re-run after it.
    pub fn trigger(self: &Arc<Self>) {
        if self.paused_for_auth.load(Ordering::SeqCst) {
            return;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.rerun_requested.store(true, Ordering::SeqCst);
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_until_settled().await;
        });
    }

    /// Runs a full cycle (and any coalesced re-runs) to completion. The
    /// awaitable counterpart of [`trigger`] for "sync now" surfaces and tests.
    pub async fn sync_now(self: &Arc<Self>) {
        if self.paused_for_auth.load(Ordering::SeqCst) {
            return;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.rerun_requested.store(true, Ordering::SeqCst);
            return;
        }
        self.run_until_settled().await;
    }

    /// The embedding shell reports an app-foreground event.
    pub fn notify_foreground(self: &Arc<Self>) {
        self.trigger();
    }

    /// Clears the auth pause once the embedder refreshed credentials.
    pub fn resume_after_reauth(self: &Arc<Self>) {
        self.paused_for_auth.store(false, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.status.write().await.needs_reauth = false;
        });
        self.trigger();
    }

    /// Spawns the background scheduler: periodic timer plus connectivity
    /// transitions. Returns the task handle so the embedder can shut it down.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval_secs = self.engine.config().sync_interval_secs;
        let auto_sync = self.engine.config().auto_sync;
        let mut connectivity_rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
            // The first tick fires immediately; that doubles as initial sync.
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if auto_sync {
                            self.trigger();
                        }
                    }
                    changed = connectivity_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *connectivity_rx.borrow_and_update();
                        if online {
                            info!("connectivity regained; scheduling sync");
                            self.trigger();
                        } else {
                            info!("connectivity lost");
                            self.status.write().await.state = SyncState::Offline;
                        }
                    }
                }
            }
        })
    }

    async fn run_until_settled(&self) {
        loop {
            loop {
                self.run_cycle().await;
                if !self.rerun_requested.swap(false, Ordering::SeqCst) {
                    break;
                }
            }
            self.in_flight.store(false, Ordering::SeqCst);
            // A trigger landing between the final flag check and the release
            // above found `in_flight` still set and could only mark the flag.
            // Claim it here or that request would wait for the next timer
            // tick. If the claim fails, another trigger holds the slot and
            // its cycle covers the request.
            if self.rerun_requested.swap(false, Ordering::SeqCst)
                && self
                    .in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                continue;
            }
            break;
        }
    }

    /// One Idle → Pulling → Pushing → Idle pass. Offline absorbs from any
    /// step; a pull failure aborts the cycle before the push phase.
    async fn run_cycle(&self) {
        if !self.connectivity.is_online() {
            self.status.write().await.state = SyncState::Offline;
            return;
        }

        self.status.write().await.state = SyncState::Pulling;
        match self.engine.pull_once().await {
            Ok(_) => {}
            Err(err) => {
                self.record_cycle_error(err).await;
                return;
            }
        }

        if !self.connectivity.is_online() {
            self.status.write().await.state = SyncState::Offline;
            return;
        }

        self.status.write().await.state = SyncState::Pushing;
        let push_result = self.engine.push_once().await;

        let pending = self.engine.pending_mutations().await.unwrap_or_default();
        let failed = self.engine.failed_mutations().await.unwrap_or_default();
        let mut status = self.status.write().await;
        status.failed_mutations = failed;
        match push_result {
            Ok(outcome) => {
                status.sync_errors += outcome.exhausted;
            }
            Err(SyncError::Auth(msg)) => {
                warn!(%msg, "sync paused pending re-authentication");
                self.paused_for_auth.store(true, Ordering::SeqCst);
                status.needs_reauth = true;
                status.sync_errors += 1;
            }
            Err(err) => {
                warn!(error = %err, "push phase failed");
                status.sync_errors += 1;
            }
        }
        status.pending_mutations = pending;
        status.last_sync_at = Some(Utc::now().timestamp_millis());
        status.state = if self.connectivity.is_online() {
            SyncState::Idle
        } else {
            SyncState::Offline
        };
    }

    async fn record_cycle_error(&self, err: SyncError) {
        let mut status = self.status.write().await;
        status.sync_errors += 1;
        match err {
            SyncError::Auth(msg) => {
                warn!(%msg, "sync paused pending re-authentication");
                self.paused_for_auth.store(true, Ordering::SeqCst);
                status.needs_reauth = true;
                status.state = SyncState::Idle;
            }
            err => {
                warn!(error = %err, "pull failed; cycle aborted");
                status.state = if self.connectivity.is_online() {
                    SyncState::Idle
                } else {
                    SyncState::Offline
                };
            }
        }
    }
}
