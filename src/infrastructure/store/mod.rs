mod mappers;
mod queries;
mod rows;
mod sqlite_local_store;
mod sqlite_outbox;
mod writer;

pub use sqlite_local_store::SqliteLocalStore;
pub use sqlite_outbox::SqliteOutbox;
pub use writer::SqliteMutationWriter;
