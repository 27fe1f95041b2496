mod cursor;
mod mutation_kind;
mod outbox_status;
mod record_id;
mod record_sync_status;
mod table_name;

pub use cursor::Cursor;
pub use mutation_kind::MutationKind;
pub use outbox_status::OutboxStatus;
pub use record_id::RecordId;
pub use record_sync_status::RecordSyncStatus;
pub use table_name::TableName;
