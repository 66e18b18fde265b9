use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const BREAK_DESCRIPTION: &str = "Break";
pub const STANDUP_DESCRIPTION: &str = "Daily";
pub const TIME_OFF_DESCRIPTION: &str = "Time Off";

/// A time entry as stored by the remote service.
///
/// Only the fields the scheduler needs are kept; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: String,
    /// Seconds. Negative while the timer is still running.
    #[serde(default)]
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub billable: bool,
}

impl TimeEntry {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn is_break_marker(&self) -> bool {
        is_break_description(self.description())
    }

    pub fn is_standup(&self) -> bool {
        self.description().trim().eq_ignore_ascii_case(STANDUP_DESCRIPTION)
    }

    pub fn is_running(&self) -> bool {
        self.duration < 0
    }

    /// Duration with running timers counted as zero.
    pub fn logged_seconds(&self) -> i64 {
        self.duration.max(0)
    }

    /// Start instant converted to `tz`; `None` when the start is empty or unparseable.
    pub fn start_in(&self, tz: Tz) -> Option<DateTime<Tz>> {
        let raw = self.start.trim();
        if raw.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&tz))
    }

    pub fn local_date(&self, tz: Tz) -> Option<NaiveDate> {
        self.start_in(tz).map(|start| start.date_naive())
    }

    pub fn end_in(&self, tz: Tz) -> Option<DateTime<Tz>> {
        if self.duration <= 0 {
            return None;
        }
        self.start_in(tz)
            .map(|start| start + chrono::Duration::seconds(self.duration))
    }
}

pub fn is_break_description(description: &str) -> bool {
    description.trim().eq_ignore_ascii_case(BREAK_DESCRIPTION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// Project name to id mapping, kept in the order the service returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMap {
    projects: Vec<Project>,
}

impl ProjectMap {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.projects
            .iter()
            .find(|project| project.name == name)
            .map(|project| project.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    /// Projects whose names appear in `allow_list`, or every project when none match.
    pub fn restricted_to(&self, allow_list: &[String]) -> Vec<&Project> {
        if allow_list.is_empty() {
            return self.projects.iter().collect();
        }
        let filtered: Vec<&Project> = self
            .projects
            .iter()
            .filter(|project| allow_list.iter().any(|name| name == &project.name))
            .collect();
        if filtered.is_empty() {
            self.projects.iter().collect()
        } else {
            filtered
        }
    }
}

/// A candidate entry before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub description: String,
    pub duration: i64,
    pub project_id: Option<u64>,
    pub billable: bool,
    pub is_break: bool,
}

impl ScheduleBlock {
    pub fn work(
        description: impl Into<String>,
        duration: i64,
        project_id: Option<u64>,
        billable: bool,
    ) -> Self {
        Self {
            description: description.into(),
            duration,
            project_id,
            billable,
            is_break: false,
        }
    }

    pub fn pause(duration: i64) -> Self {
        Self {
            description: BREAK_DESCRIPTION.to_string(),
            duration,
            project_id: None,
            billable: false,
            is_break: true,
        }
    }

    pub fn with_duration(&self, duration: i64) -> Self {
        Self {
            duration,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBlock {
    pub start: DateTime<Tz>,
    pub block: ScheduleBlock,
}

impl ScheduledBlock {
    pub fn end(&self) -> DateTime<Tz> {
        self.start + chrono::Duration::seconds(self.block.duration)
    }
}

/// Hours answer given for one activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllocationInput {
    /// Empty answer: put everything left into this activity.
    FillRemaining,
    Skip,
    Hours(f64),
    Invalid,
}

impl AllocationInput {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::FillRemaining;
        }
        match parse_hours(raw) {
            Ok(hours) if hours > 0.0 => Self::Hours(hours),
            Ok(_) => Self::Skip,
            Err(_) => Self::Invalid,
        }
    }
}

/// Answer to a y/N question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Invalid,
}

impl Confirmation {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "" | "n" | "no" => Self::No,
            _ => Self::Invalid,
        }
    }
}

/// Parses `H:mm` or decimal hours.
pub fn parse_hours(value: &str) -> Result<f64, String> {
    let value = value.trim();
    if let Some((hours, minutes)) = value.split_once(':') {
        let hours = hours
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid hours '{value}'"))?;
        let minutes = minutes
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid minutes '{value}'"))?;
        if minutes > 59 {
            return Err(format!("minutes must be < 60 in '{value}'"));
        }
        return Ok(f64::from(hours) + f64::from(minutes) / 60.0);
    }
    let hours = value
        .parse::<f64>()
        .map_err(|_| format!("invalid hours '{value}'"))?;
    if !hours.is_finite() {
        return Err(format!("invalid hours '{value}'"));
    }
    Ok(hours)
}

/// Longest single entry accepted from an explicit hours answer.
pub const MAX_ENTRY_HOURS: f64 = 24.0;

pub fn hours_to_seconds(hours: f64) -> i64 {
    (hours * 3600.0).round() as i64
}

/// `7h 45m`, `8h`, `15m`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    match (hours, minutes) {
        (0, minutes) => format!("{minutes}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, minutes) => format!("{hours}h {minutes:02}m"),
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| format!("'{}' must be HH:MM", value.trim()))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' must be YYYY-MM-DD", value.trim()))
}

/// Parses `YYYY-MM` into a year and month.
pub fn parse_year_month(value: &str) -> Result<(i32, u32), String> {
    let value = value.trim();
    let invalid = || format!("'{value}' must be YYYY-MM");
    let (year, month) = value.split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// `date` at `time` in `tz`. A wall time skipped by a DST jump is read as UTC-offset time.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Local `[00:00:00, 23:59:59]` of `first..=last`, as UTC instants.
pub fn local_day_range(
    tz: Tz,
    first: NaiveDate,
    last: NaiveDate,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_instant(tz, first, NaiveTime::MIN);
    let end = local_instant(
        tz,
        last,
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    );
    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}
