use crate::application::ports::remote_authority::RemoteAuthority;
use crate::domain::entities::{PullRequest, PullResponse, RemoteRecord};
use crate::domain::value_objects::{Cursor, RecordId, TableName};
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const SCHEMA_VERSION: u32 = 1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the sync server over HTTP. Pull is a single POST against the
/// sync endpoint; pushes are plain per-record CRUD calls.
pub struct HttpRemoteAuthority {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpRemoteAuthority {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Installs (or replaces) the bearer token, e.g. after a re-login.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Auth(detail),
            StatusCode::NOT_FOUND => SyncError::NotFound(detail),
            StatusCode::CONFLICT => SyncError::Conflict(detail),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                SyncError::Validation(detail)
            }
            _ => SyncError::Network(detail),
        })
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemoteAuthority {
    async fn pull(&self, cursor: Cursor) -> Result<PullResponse> {
        debug!(cursor = cursor.millis(), "Pulling changes");
        let request = PullRequest {
            last_pulled_at: cursor.millis(),
            schema_version: Some(SCHEMA_VERSION),
        };
        let response = self
            .authorize(self.http.post(self.url("sync/pull")))
            .await
            .json(&request)
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json::<PullResponse>().await?)
    }

    async fn create_record(&self, table: &TableName, payload: &Value) -> Result<RemoteRecord> {
        let response = self
            .authorize(self.http.post(self.url(table.as_str())))
            .await
            .json(payload)
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json::<RemoteRecord>().await?)
    }

    async fn update_record(
        &self,
        table: &TableName,
        id: &RecordId,
        payload: &Value,
    ) -> Result<RemoteRecord> {
        let path = format!("{}/{}", table.as_str(), id.as_str());
        let response = self
            .authorize(self.http.put(self.url(&path)))
            .await
            .json(payload)
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json::<RemoteRecord>().await?)
    }

    async fn delete_record(&self, table: &TableName, id: &RecordId) -> Result<()> {
        let path = format!("{}/{}", table.as_str(), id.as_str());
        let response = self
            .authorize(self.http.delete(self.url(&path)))
            .await
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}
