use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique record identity. Client-assigned for records created
/// offline; replaced by the server-assigned id once the create is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: String) -> std::result::Result<Self, String> {
        if value.trim().is_empty() {
            return Err("Record id must not be empty".to_string());
        }
        Ok(Self(value))
    }

    /// Client-side id for a record created while offline.
    pub fn new_local() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
