use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub table_name: String,
    pub id: String,
    pub payload: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_dirty: bool,
    pub sync_status: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct OutboxRow {
    pub seq: i64,
    pub id: String,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub payload: Option<String>,
    pub status: String,
    pub retry_count: i64,
    pub last_retry_at: Option<i64>,
    pub next_retry_at: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: i64,
}
