use crate::domain::entities::record::RemoteRecord;
use crate::domain::value_objects::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Per-table delta returned by a pull. A given id appears in at most one of
/// the three buckets; `deleted` carries ids only, never payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    #[serde(default)]
    pub created: Vec<RemoteRecord>,
    #[serde(default)]
    pub updated: Vec<RemoteRecord>,
    #[serde(default)]
    pub deleted: Vec<RecordId>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Checks the one-bucket-per-id invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen: HashSet<&RecordId> = HashSet::new();
        let ids = self
            .created
            .iter()
            .map(|r| &r.id)
            .chain(self.updated.iter().map(|r| &r.id))
            .chain(self.deleted.iter());
        for id in ids {
            if !seen.insert(id) {
                return Err(format!("Record '{id}' appears in more than one bucket"));
            }
        }
        Ok(())
    }
}

/// Body of a pull response: one changeset per table, plus the server
/// timestamp the cursor advances to once everything applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    pub changes: BTreeMap<String, Changeset>,
    /// Server time in integer millis.
    pub timestamp: i64,
}

/// Body of a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub last_pulled_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pull_response_parses_wire_format() {
        let raw = json!({
            "changes": {
                "tasks": {
                    "created": [{"id": "t1", "createdAt": 10, "updatedAt": 10, "title": "a"}],
                    "updated": [],
                    "deleted": ["t9"]
                }
            },
            "timestamp": 42
        });
        let response: PullResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.timestamp, 42);
        let tasks = &response.changes["tasks"];
        assert_eq!(tasks.created.len(), 1);
        assert_eq!(tasks.deleted[0].as_str(), "t9");
        assert!(tasks.validate().is_ok());
    }

    #[test]
    fn missing_buckets_default_to_empty() {
        let changeset: Changeset = serde_json::from_value(json!({})).unwrap();
        assert!(changeset.is_empty());
    }

    #[test]
    fn validate_rejects_id_in_two_buckets() {
        let raw = json!({
            "updated": [{"id": "t1", "createdAt": 1, "updatedAt": 2}],
            "deleted": ["t1"]
        });
        let changeset: Changeset = serde_json::from_value(raw).unwrap();
        assert!(changeset.validate().is_err());
    }
}
