use crate::domain::analyzer::{last_day_of_month, recent_activities};
use crate::domain::models::{ProjectMap, ScheduledBlock, TimeEntry, local_day_range};
use crate::infrastructure::config::Settings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_cache::{KEY_WORKSPACE_ID, SessionCache};
use crate::infrastructure::toggl_client::{NewTimeEntry, TimeTrackingClient};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Per-run context: the remote client, effective settings and the lazily resolved workspace.
pub struct Session<C>
where
    C: TimeTrackingClient,
{
    client: Arc<C>,
    settings: Settings,
    cache: Arc<dyn SessionCache>,
    workspace_id: OnceCell<u64>,
    now_provider: NowProvider,
}

impl<C> Session<C>
where
    C: TimeTrackingClient,
{
    pub fn new(client: Arc<C>, settings: Settings, cache: Arc<dyn SessionCache>) -> Self {
        Self {
            client,
            settings,
            cache,
            workspace_id: OnceCell::new(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tz(&self) -> Tz {
        self.settings.timezone
    }

    pub fn now(&self) -> DateTime<Tz> {
        (self.now_provider)().with_timezone(&self.settings.timezone)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Configured workspace, otherwise the profile's default; fetched at most once.
    pub async fn workspace_id(&self) -> Result<u64, InfraError> {
        self.workspace_id
            .get_or_try_init(|| self.resolve_workspace_id())
            .await
            .copied()
    }

    async fn resolve_workspace_id(&self) -> Result<u64, InfraError> {
        if let Some(configured) = self.settings.workspace_id {
            return Ok(configured);
        }
        let detected = self.client.default_workspace_id().await?;
        info!(workspace_id = detected, "detected default workspace");
        self.remember(KEY_WORKSPACE_ID, &detected.to_string());
        Ok(detected)
    }

    /// Entries starting between local midnight of `first` and 23:59:59 of `last`.
    pub async fn entries_between(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<TimeEntry>, InfraError> {
        let (start, end) = local_day_range(self.tz(), first, last);
        let entries = self.client.list_time_entries(start, end).await?;
        debug!(%first, %last, count = entries.len(), "fetched time entries");
        Ok(entries)
    }

    pub async fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<TimeEntry>, InfraError> {
        self.entries_between(date, date).await
    }

    /// The whole month in one request.
    pub async fn entries_for_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<TimeEntry>, InfraError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| InfraError::Validation(format!("invalid month {year}-{month:02}")))?;
        let last = last_day_of_month(year, month)
            .ok_or_else(|| InfraError::Validation(format!("invalid month {year}-{month:02}")))?;
        self.entries_between(first, last).await
    }

    pub async fn projects(&self) -> Result<ProjectMap, InfraError> {
        let workspace_id = self.workspace_id().await?;
        let projects = self.client.list_projects(workspace_id).await?;
        Ok(ProjectMap::new(projects))
    }

    /// Distinct descriptions from the lookback window, newest first.
    pub async fn recent_activities(&self) -> Result<Vec<String>, InfraError> {
        let today = self.today();
        let first = today - chrono::Duration::days(i64::from(self.settings.lookback_days));
        let entries = self.entries_between(first, today).await?;
        Ok(recent_activities(&entries))
    }

    pub async fn create_entry(&self, scheduled: &ScheduledBlock) -> Result<TimeEntry, InfraError> {
        let workspace_id = self.workspace_id().await?;
        let block = &scheduled.block;
        let request = NewTimeEntry::new(
            workspace_id,
            block.description.clone(),
            block.project_id,
            scheduled.start.with_timezone(&Utc),
            block.duration,
            block.billable,
        );
        let created = self.client.create_time_entry(&request).await?;
        info!(
            description = %block.description,
            start = %request.start,
            duration = block.duration,
            "created time entry"
        );
        Ok(created)
    }

    /// Writes to the local cache; a cache failure never interrupts the session.
    pub fn remember(&self, key: &str, value: &str) {
        if let Err(error) = self.cache.put(key, value, (self.now_provider)()) {
            warn!(key, %error, "failed to update session cache");
        }
    }

    pub fn recall(&self, key: &str) -> Option<String> {
        match self.cache.get(key) {
            Ok(Some(cached)) => {
                debug!(key, updated_at = %cached.updated_at, "session cache hit");
                Some(cached.value)
            }
            Ok(None) => None,
            Err(error) => {
                warn!(key, %error, "failed to read session cache");
                None
            }
        }
    }
}
