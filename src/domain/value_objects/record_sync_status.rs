use serde::{Deserialize, Serialize};

/// Client-local lifecycle marker on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSyncStatus {
    Created,
    Updated,
    Synced,
    Deleted,
    Unknown(String),
}

impl RecordSyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RecordSyncStatus::Created => "created",
            RecordSyncStatus::Updated => "updated",
            RecordSyncStatus::Synced => "synced",
            RecordSyncStatus::Deleted => "deleted",
            RecordSyncStatus::Unknown(value) => value.as_str(),
        }
    }
}

impl From<&str> for RecordSyncStatus {
    fn from(value: &str) -> Self {
        match value {
            "created" => RecordSyncStatus::Created,
            "updated" => RecordSyncStatus::Updated,
            "synced" => RecordSyncStatus::Synced,
            "deleted" => RecordSyncStatus::Deleted,
            other => RecordSyncStatus::Unknown(other.to_string()),
        }
    }
}
