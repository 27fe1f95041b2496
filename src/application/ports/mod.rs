pub mod connectivity;
pub mod local_store;
pub mod mutations;
pub mod outbox;
pub mod remote_authority;

pub use connectivity::{ConnectivityMonitor, ManualConnectivity};
pub use local_store::{ChangeEvent, ChangeKind, CursorStore, LocalStore};
pub use mutations::MutationWriter;
pub use outbox::OutboxQueue;
pub use remote_authority::RemoteAuthority;
