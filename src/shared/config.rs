use serde::{Deserialize, Serialize};

/// Tombstone cascade: deleting a record in `parent_table` destroys the
/// records in `child_table` whose `foreign_key` field points at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CascadeRule {
    pub parent_table: String,
    pub child_table: String,
    pub foreign_key: String,
}

impl CascadeRule {
    pub fn new(parent_table: &str, child_table: &str, foreign_key: &str) -> Self {
        Self {
            parent_table: parent_table.to_string(),
            child_table: child_table.to_string(),
            foreign_key: foreign_key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub max_retry: u32,
    pub batch_size: u32,
    pub backoff_base_ms: i64,
    pub backoff_cap_ms: i64,
    pub backoff_jitter_ratio: f64,
    /// Clock-skew tolerance applied when classifying create-vs-update near
    /// the pull cursor boundary. Inherited from the reference policy; known
    /// to misclassify under skew larger than the window.
    pub tolerance_window_ms: i64,
    pub cascades: Vec<CascadeRule>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_secs: 300, // 5 minutes
            max_retry: 3,
            batch_size: 100,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            backoff_jitter_ratio: 0.2,
            tolerance_window_ms: 1_500,
            cascades: vec![
                CascadeRule::new("projects", "tasks", "projectId"),
                CascadeRule::new("tasks", "attachments", "taskId"),
            ],
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TASKLANE_AUTO_SYNC") {
            cfg.auto_sync = parse_bool(&v, cfg.auto_sync);
        }
        if let Ok(v) = std::env::var("TASKLANE_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync_interval_secs = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TASKLANE_SYNC_MAX_RETRY") {
            if let Some(value) = parse_u64(&v) {
                cfg.max_retry = value as u32;
            }
        }
        if let Ok(v) = std::env::var("TASKLANE_SYNC_BATCH_SIZE") {
            if let Some(value) = parse_u64(&v) {
                cfg.batch_size = (value as u32).max(1);
            }
        }
        if let Ok(v) = std::env::var("TASKLANE_SYNC_BACKOFF_BASE_MS") {
            if let Some(value) = parse_i64(&v) {
                cfg.backoff_base_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TASKLANE_SYNC_BACKOFF_CAP_MS") {
            if let Some(value) = parse_i64(&v) {
                cfg.backoff_cap_ms = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.sync_interval_secs == 0 {
            return Err("Sync sync_interval_secs must be greater than 0".to_string());
        }
        if self.backoff_base_ms <= 0 || self.backoff_cap_ms <= 0 {
            return Err("Backoff delays must be greater than 0".to_string());
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err("Backoff cap must not be below the base delay".to_string());
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter_ratio) {
            return Err("Backoff jitter ratio must be within [0, 1]".to_string());
        }
        if self.tolerance_window_ms < 0 {
            return Err("Tolerance window must not be negative".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_i64(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}
