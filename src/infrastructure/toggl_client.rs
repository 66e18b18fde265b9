use crate::domain::models::{Project, TimeEntry};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

pub const TOGGL_API_BASE: &str = "https://api.track.toggl.com/api/v9/";
pub const CREATED_WITH: &str = "toggl-autofill-cli";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NewTimeEntry {
    pub description: String,
    pub start: String,
    pub duration: i64,
    pub workspace_id: u64,
    pub billable: bool,
    pub created_with: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
}

impl NewTimeEntry {
    pub fn new(
        workspace_id: u64,
        description: impl Into<String>,
        project_id: Option<u64>,
        start: DateTime<Utc>,
        duration: i64,
        billable: bool,
    ) -> Self {
        Self {
            description: description.into(),
            start: start.to_rfc3339_opts(SecondsFormat::Secs, true),
            duration,
            workspace_id,
            billable,
            created_with: CREATED_WITH.to_string(),
            project_id,
        }
    }
}

#[async_trait]
pub trait TimeTrackingClient: Send + Sync {
    async fn default_workspace_id(&self) -> Result<u64, InfraError>;

    async fn list_time_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, InfraError>;

    async fn list_projects(&self, workspace_id: u64) -> Result<Vec<Project>, InfraError>;

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTogglClient {
    client: Client,
    api_token: String,
    base_url: String,
}

impl ReqwestTogglClient {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_token: api_token.into(),
            base_url: TOGGL_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.base_url).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid toggl api base url: {error}"))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("toggl api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.api_token, Some("api_token"))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, InfraError> {
        Self::ensure_non_empty(&self.api_token, "api token")?;

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("{action}: {error}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Network(format!("failed reading {action} response: {error}"))
        })?;
        debug!(action, status = status.as_u16(), "toggl response");

        if !status.is_success() {
            warn!(action, status = status.as_u16(), "toggl request rejected");
            return Err(remote_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            warn!(action, %error, "unreadable toggl payload");
            InfraError::Json(error)
        })
    }
}

fn remote_error(status: StatusCode, body: &str) -> InfraError {
    InfraError::Remote {
        status: status.as_u16(),
        body: body.to_string(),
    }
}

#[derive(Debug, serde::Deserialize)]
struct MeResponse {
    default_workspace_id: Option<u64>,
}

#[async_trait]
impl TimeTrackingClient for ReqwestTogglClient {
    async fn default_workspace_id(&self) -> Result<u64, InfraError> {
        let endpoint = self.endpoint(&["me"])?;
        let me: MeResponse = self
            .send(self.client.get(endpoint), "resolving default workspace")
            .await?;
        me.default_workspace_id.ok_or_else(|| {
            InfraError::InvalidConfig(
                "profile has no default workspace; set TOGGL_WORKSPACE_ID".to_string(),
            )
        })
    }

    async fn list_time_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, InfraError> {
        let endpoint = self.endpoint(&["me", "time_entries"])?;
        let request = self.client.get(endpoint).query(&[
            ("start_date", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end_date", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]);
        let entries: Option<Vec<TimeEntry>> =
            self.send(request, "listing time entries").await?;
        Ok(entries.unwrap_or_default())
    }

    async fn list_projects(&self, workspace_id: u64) -> Result<Vec<Project>, InfraError> {
        let workspace = workspace_id.to_string();
        let endpoint = self.endpoint(&["workspaces", &workspace, "projects"])?;
        let projects: Option<Vec<Project>> = self
            .send(self.client.get(endpoint), "listing projects")
            .await?;
        Ok(projects.unwrap_or_default())
    }

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError> {
        Self::ensure_non_empty(&entry.description, "time entry description")?;
        let workspace = entry.workspace_id.to_string();
        let endpoint = self.endpoint(&["workspaces", &workspace, "time_entries"])?;
        self.send(self.client.post(endpoint).json(entry), "creating time entry")
            .await
    }
}
