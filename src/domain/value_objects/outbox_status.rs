use serde::{Deserialize, Serialize};

/// Lifecycle of a queued mutation: pending → processing → (completed | failed).
/// Completed entries are purged; failed ones are permanent and surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl OutboxStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Completed => "completed",
            OutboxStatus::Failed => "failed",
            OutboxStatus::Unknown(value) => value.as_str(),
        }
    }
}

impl From<&str> for OutboxStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => OutboxStatus::Pending,
            "processing" => OutboxStatus::Processing,
            "completed" => OutboxStatus::Completed,
            "failed" => OutboxStatus::Failed,
            other => OutboxStatus::Unknown(other.to_string()),
        }
    }
}
