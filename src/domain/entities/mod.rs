mod changeset;
mod outbox_entry;
mod record;

pub use changeset::{Changeset, PullRequest, PullResponse};
pub use outbox_entry::{FailureDisposition, OutboxEntry};
pub use record::{LocalRecord, RemoteRecord};
