pub mod backoff;
pub mod engine;
pub mod orchestrator;

pub use backoff::BackoffPolicy;
pub use engine::{PushOutcome, SyncEngine};
pub use orchestrator::{SyncOrchestrator, SyncState, SyncStatusSnapshot};
