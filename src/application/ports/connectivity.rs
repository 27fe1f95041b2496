use tokio::sync::watch;

/// Connectivity signal the orchestrator consumes. The embedder (mobile shell,
/// desktop app) reports transitions; the engine never probes the network
/// itself.
pub trait ConnectivityMonitor: Send + Sync {
    fn is_online(&self) -> bool;

    /// Watch channel carrying the current online flag; the orchestrator
    /// triggers a cycle on false→true transitions.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Monitor driven explicitly by the embedder (and by tests).
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        // send_replace so the value updates even with no live receiver.
        self.tx.send_replace(online);
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
