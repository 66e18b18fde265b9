use crate::application::console::Console;
use crate::application::session::{NowProvider, Session};
use crate::domain::breaks::StepSource;
use crate::domain::models::{Project, TimeEntry};
use crate::infrastructure::config::Settings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_cache::InMemorySessionCache;
use crate::infrastructure::toggl_client::{NewTimeEntry, TimeTrackingClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

pub struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    pub fn new(label: &str) -> Self {
        let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "toggl-autofill-{label}-{}-{}",
            std::process::id(),
            sequence
        ));
        fs::create_dir_all(&path).expect("create temp workspace");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// In-memory stand-in for the remote service.
#[derive(Debug, Default)]
pub struct FakeClient {
    entries: Mutex<Vec<TimeEntry>>,
    projects: Mutex<Vec<Project>>,
    failing_descriptions: Mutex<Vec<String>>,
    ranges: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    created: Mutex<Vec<NewTimeEntry>>,
    pub workspace_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub project_calls: AtomicUsize,
}

impl FakeClient {
    pub const DEFAULT_WORKSPACE: u64 = 9001;

    pub fn with_entries(self, entries: Vec<TimeEntry>) -> Self {
        *self.entries.lock().expect("entries lock") = entries;
        self
    }

    pub fn with_projects(self, projects: &[(u64, &str)]) -> Self {
        *self.projects.lock().expect("projects lock") = projects
            .iter()
            .map(|(id, name)| project(*id, name))
            .collect();
        self
    }

    pub fn failing_on(self, description: &str) -> Self {
        self.failing_descriptions
            .lock()
            .expect("failures lock")
            .push(description.to_string());
        self
    }

    pub fn created(&self) -> Vec<NewTimeEntry> {
        self.created.lock().expect("created lock").clone()
    }

    pub fn requested_ranges(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.ranges.lock().expect("ranges lock").clone()
    }
}

#[async_trait]
impl TimeTrackingClient for FakeClient {
    async fn default_workspace_id(&self) -> Result<u64, InfraError> {
        self.workspace_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::DEFAULT_WORKSPACE)
    }

    async fn list_time_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, InfraError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().expect("ranges lock").push((start, end));
        let entries = self.entries.lock().expect("entries lock");
        Ok(entries
            .iter()
            .filter(|entry| match entry.start_in(chrono_tz::UTC) {
                Some(instant) => {
                    let instant = instant.with_timezone(&Utc);
                    instant >= start && instant <= end
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_projects(&self, _workspace_id: u64) -> Result<Vec<Project>, InfraError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.projects.lock().expect("projects lock").clone())
    }

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError> {
        let failing = self
            .failing_descriptions
            .lock()
            .expect("failures lock")
            .iter()
            .any(|description| description == &entry.description);
        if failing {
            return Err(InfraError::Remote {
                status: 500,
                body: format!("cannot create '{}'", entry.description),
            });
        }
        let mut created = self.created.lock().expect("created lock");
        created.push(entry.clone());
        Ok(TimeEntry {
            id: Some(created.len() as u64),
            description: Some(entry.description.clone()),
            start: entry.start.clone(),
            duration: entry.duration,
            project_id: entry.project_id,
            billable: entry.billable,
        })
    }
}

/// Console fed from a fixed list of answers. Asking past the end reads as closed input.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    closed: bool,
    pub prompts: Vec<String>,
    pub lines: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|answer| answer.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn unanswered(&self) -> usize {
        self.answers.len()
    }

    pub fn output(&self) -> String {
        self.lines.join("\n")
    }
}

impl Console for ScriptedConsole {
    fn ask(&mut self, prompt: &str) -> String {
        self.prompts.push(prompt.to_string());
        match self.answers.pop_front() {
            Some(answer) => answer.trim().to_string(),
            None => {
                self.closed = true;
                String::new()
            }
        }
    }

    fn say(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Step source replaying a pinned sequence, then the maximum.
#[derive(Debug, Default)]
pub struct FixedSteps {
    steps: VecDeque<u32>,
}

impl FixedSteps {
    pub fn new(steps: Vec<u32>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl StepSource for FixedSteps {
    fn next_steps(&mut self, min: u32, max: u32) -> u32 {
        self.steps.pop_front().unwrap_or(max).clamp(min, max)
    }
}

pub fn fixed_now(value: &str) -> NowProvider {
    let instant = DateTime::parse_from_rfc3339(value)
        .expect("valid datetime")
        .with_timezone(&Utc);
    Arc::new(move || instant)
}

pub fn test_settings() -> Settings {
    Settings {
        api_token: "token".to_string(),
        workspace_id: Some(42),
        ..Settings::default()
    }
}

pub fn test_session(client: Arc<FakeClient>, settings: Settings) -> Session<FakeClient> {
    session_at(client, settings, "2026-02-20T18:30:00Z")
}

pub fn session_at(client: Arc<FakeClient>, settings: Settings, now: &str) -> Session<FakeClient> {
    Session::new(client, settings, Arc::new(InMemorySessionCache::default()))
        .with_now_provider(fixed_now(now))
}

pub fn project(id: u64, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
    }
}

pub fn entry(description: &str, start: &str, duration: i64) -> TimeEntry {
    TimeEntry {
        description: Some(description.to_string()),
        start: start.to_string(),
        duration,
        billable: true,
        ..TimeEntry::default()
    }
}
