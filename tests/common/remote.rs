use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tasklane::{
    Changeset, Cursor, PullResponse, RecordId, RemoteAuthority, RemoteRecord, Result, SyncError,
    TableName,
};

#[derive(Debug, Clone)]
struct ServerRecord {
    created_at: i64,
    updated_at: i64,
    fields: Map<String, Value>,
}

#[derive(Debug, Default)]
struct ServerState {
    clock: i64,
    next_id: u64,
    tables: BTreeMap<String, BTreeMap<String, ServerRecord>>,
    tombstones: BTreeMap<String, BTreeMap<String, i64>>,
    push_fail_plan: VecDeque<SyncError>,
    pull_fail_plan: VecDeque<SyncError>,
    staged_pull: Option<PullResponse>,
    create_calls: u32,
    update_calls: u32,
    delete_calls: u32,
}

impl ServerState {
    fn tick(&mut self) -> i64 {
        self.clock += 10;
        self.clock
    }

    fn take_push_failure(&mut self) -> Option<SyncError> {
        self.push_fail_plan.pop_front()
    }
}

fn strip_envelope(payload: &Value) -> Map<String, Value> {
    let mut fields = match payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    fields.remove("id");
    fields.remove("createdAt");
    fields.remove("updatedAt");
    fields
}

/// An in-process stand-in for the sync server: authoritative tables, logical
/// clock, tombstones, and an error plan for injecting failures into the next
/// calls.
pub struct InMemoryRemote {
    state: Mutex<ServerState>,
    tolerance_ms: i64,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                clock: 1_000,
                ..ServerState::default()
            }),
            tolerance_ms: 0,
        }
    }

    /// Queues an error against the push endpoints; each queued error consumes
    /// exactly one create/update/delete call.
    pub fn fail_next(&self, err: SyncError) {
        self.state.lock().unwrap().push_fail_plan.push_back(err);
    }

    pub fn fail_next_network(&self, times: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..times {
            state
                .push_fail_plan
                .push_back(SyncError::Network("connection refused".into()));
        }
    }

    /// Queues an error against the next pull.
    pub fn fail_next_pull(&self, err: SyncError) {
        self.state.lock().unwrap().pull_fail_plan.push_back(err);
    }

    /// Forces the next pull to return exactly this response.
    pub fn stage_pull(&self, response: PullResponse) {
        self.state.lock().unwrap().staged_pull = Some(response);
    }

    /// A write arriving from elsewhere (another device, the web app).
    pub fn seed(&self, table: &str, fields: Value) -> RemoteRecord {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("srv-{}", state.next_id);
        let now = state.tick();
        let record = ServerRecord {
            created_at: now,
            updated_at: now,
            fields: strip_envelope(&fields),
        };
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(id.clone(), record.clone());
        RemoteRecord {
            id: RecordId::new(id).unwrap(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            fields: record.fields,
        }
    }

    pub fn edit(&self, table: &str, id: &str, patch: Value) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        let record = state
            .tables
            .get_mut(table)
            .and_then(|t| t.get_mut(id))
            .expect("edit of unknown server record");
        for (key, value) in strip_envelope(&patch) {
            record.fields.insert(key, value);
        }
        record.updated_at = now;
    }

    pub fn remove(&self, table: &str, id: &str) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(records) = state.tables.get_mut(table) {
            records.remove(id);
        }
        state
            .tombstones
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), now);
    }

    pub fn record(&self, table: &str, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(table)
            .and_then(|t| t.get(id))
            .map(|r| Value::Object(r.fields.clone()))
    }

    pub fn record_count(&self, table: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().unwrap().create_calls
    }

    pub fn update_calls(&self) -> u32 {
        self.state.lock().unwrap().update_calls
    }

    pub fn delete_calls(&self) -> u32 {
        self.state.lock().unwrap().delete_calls
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteAuthority for InMemoryRemote {
    async fn pull(&self, cursor: Cursor) -> Result<PullResponse> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.pull_fail_plan.pop_front() {
            return Err(err);
        }
        if let Some(staged) = state.staged_pull.take() {
            return Ok(staged);
        }

        let since = cursor.millis().saturating_sub(self.tolerance_ms);
        let mut changes: BTreeMap<String, Changeset> = BTreeMap::new();
        for (table, records) in &state.tables {
            let mut changeset = Changeset::default();
            for (id, record) in records {
                let remote = RemoteRecord {
                    id: RecordId::new(id.clone()).unwrap(),
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                    fields: record.fields.clone(),
                };
                if record.created_at > since {
                    changeset.created.push(remote);
                } else if record.updated_at > since {
                    changeset.updated.push(remote);
                }
            }
            changes.insert(table.clone(), changeset);
        }
        for (table, tombstones) in &state.tombstones {
            let deleted: Vec<RecordId> = tombstones
                .iter()
                .filter(|(_, deleted_at)| **deleted_at > since)
                .map(|(id, _)| RecordId::new(id.clone()).unwrap())
                .collect();
            if !deleted.is_empty() {
                changes.entry(table.clone()).or_default().deleted = deleted;
            }
        }

        Ok(PullResponse {
            changes,
            timestamp: state.clock,
        })
    }

    async fn create_record(&self, table: &TableName, payload: &Value) -> Result<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if let Some(err) = state.take_push_failure() {
            return Err(err);
        }
        state.next_id += 1;
        let id = format!("srv-{}", state.next_id);
        let now = state.tick();
        let record = ServerRecord {
            created_at: now,
            updated_at: now,
            fields: strip_envelope(payload),
        };
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(id.clone(), record.clone());
        Ok(RemoteRecord {
            id: RecordId::new(id).unwrap(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            fields: record.fields,
        })
    }

    async fn update_record(
        &self,
        table: &TableName,
        id: &RecordId,
        payload: &Value,
    ) -> Result<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if let Some(err) = state.take_push_failure() {
            return Err(err);
        }
        let now = state.tick();
        let record = state
            .tables
            .get_mut(table.as_str())
            .and_then(|t| t.get_mut(id.as_str()))
            .ok_or_else(|| SyncError::NotFound(format!("{table}/{id}")))?;
        for (key, value) in strip_envelope(payload) {
            record.fields.insert(key, value);
        }
        record.updated_at = now;
        Ok(RemoteRecord {
            id: id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            fields: record.fields.clone(),
        })
    }

    async fn delete_record(&self, table: &TableName, id: &RecordId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        if let Some(err) = state.take_push_failure() {
            return Err(err);
        }
        let now = state.tick();
        let removed = state
            .tables
            .get_mut(table.as_str())
            .and_then(|t| t.remove(id.as_str()));
        if removed.is_none() {
            return Err(SyncError::NotFound(format!("{table}/{id}")));
        }
        state
            .tombstones
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), now);
        Ok(())
    }
}
