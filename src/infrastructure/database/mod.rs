mod connection_pool;

pub use connection_pool::{initialize_schema, Database};
