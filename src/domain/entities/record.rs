use crate::domain::value_objects::{RecordId, RecordSyncStatus, TableName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A synchronizable record as held in the local store.
///
/// `payload` carries the entity-specific fields as a JSON object; identity,
/// timestamps and the client-local sync markers live beside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub table: TableName,
    pub id: RecordId,
    pub payload: Value,
    /// Millis since epoch. Invariant: `updated_at >= created_at`.
    pub created_at: i64,
    pub updated_at: i64,
    pub is_dirty: bool,
    pub sync_status: RecordSyncStatus,
}

impl LocalRecord {
    /// Payload as sent to the server: entity fields plus identity and
    /// timestamps, whole-record granularity.
    pub fn wire_payload(&self) -> Value {
        let mut map = match &self.payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert("createdAt".to_string(), Value::from(self.created_at));
        map.insert("updatedAt".to_string(), Value::from(self.updated_at));
        Value::Object(map)
    }
}

/// A record as the Remote Authority ships it: canonical id, server
/// timestamps, and the entity fields flattened around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    pub fn fields_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
