use crate::domain::breaks::DEFAULT_BREAK_SECONDS;
use crate::domain::models::{hours_to_seconds, parse_hhmm};
use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_JSON: &str = "config.json";
pub const PLACEHOLDER_TOKEN: &str = "YOUR_TOGGL_API_TOKEN";

const DEFAULT_TIMEZONE: &str = "Europe/Madrid";
const DEFAULT_WORKDAY_HOURS: f64 = 8.0;
const DEFAULT_DAY_START: &str = "09:15";
const DEFAULT_TIME_OFF_PROJECT: &str = "Time Off - (UNPAID)";
const DEFAULT_STANDUP_MINUTES: u32 = 15;
const DEFAULT_LOOKBACK_DAYS: u32 = 14;
const MAX_LOOKBACK_DAYS: u32 = 366;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Optional overrides read from `config.json`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub schema: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workday_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_off_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_standup_mins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_projects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_lookback_days: Option<u32>,
}

/// Effective settings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_token: String,
    pub workspace_id: Option<u64>,
    pub timezone: Tz,
    pub workday_hours: f64,
    pub day_start: NaiveTime,
    pub billable: bool,
    pub time_off_project: String,
    pub standup_minutes: u32,
    pub default_projects: Vec<String>,
    pub break_minutes: u32,
    pub lookback_days: u32,
}

impl Settings {
    pub fn workday_seconds(&self) -> i64 {
        hours_to_seconds(self.workday_hours)
    }

    pub fn standup_seconds(&self) -> i64 {
        i64::from(self.standup_minutes) * 60
    }

    pub fn break_seconds(&self) -> i64 {
        i64::from(self.break_minutes) * 60
    }

    pub fn has_token(&self) -> bool {
        let token = self.api_token.trim();
        !token.is_empty() && token != PLACEHOLDER_TOKEN
    }

    /// Fails with an instruction when no usable API token was found.
    pub fn require_token(&self) -> Result<(), InfraError> {
        if self.has_token() {
            return Ok(());
        }
        Err(InfraError::InvalidConfig(format!(
            "missing toggl api token (set TOGGL_API_TOKEN in the environment or .env, \
             or \"apiToken\" in {CONFIG_JSON})"
        )))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: PLACEHOLDER_TOKEN.to_string(),
            workspace_id: None,
            timezone: chrono_tz::Europe::Madrid,
            workday_hours: DEFAULT_WORKDAY_HOURS,
            day_start: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN),
            billable: true,
            time_off_project: DEFAULT_TIME_OFF_PROJECT.to_string(),
            standup_minutes: DEFAULT_STANDUP_MINUTES,
            default_projects: Vec::new(),
            break_minutes: (DEFAULT_BREAK_SECONDS / 60) as u32,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

fn default_file() -> ConfigFile {
    ConfigFile {
        schema: 1,
        timezone: Some(DEFAULT_TIMEZONE.to_string()),
        workday_hours: Some(DEFAULT_WORKDAY_HOURS),
        day_start_time: Some(DEFAULT_DAY_START.to_string()),
        billable: Some(true),
        time_off_project: Some(DEFAULT_TIME_OFF_PROJECT.to_string()),
        daily_standup_mins: Some(DEFAULT_STANDUP_MINUTES),
        default_projects: Some(Vec::new()),
        ..ConfigFile::default()
    }
}

pub fn ensure_default_config(root: &Path) -> Result<(), InfraError> {
    let path = root.join(CONFIG_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_file())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn read_config(path: &Path) -> Result<ConfigFile, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(serde_json::from_value(parsed)?)
}

pub fn load_settings(root: &Path) -> Result<Settings, InfraError> {
    let file = read_config(&root.join(CONFIG_JSON))?;
    load_settings_from_lookup(|key| std::env::var(key).ok(), &file)
}

/// Environment value first, then `config.json`, then the built-in default.
pub fn load_settings_from_lookup<F>(lookup: F, file: &ConfigFile) -> Result<Settings, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Settings::default();

    let api_token = optional_lookup_value(&lookup, "TOGGL_API_TOKEN")
        .or_else(|| non_blank(file.api_token.as_deref()))
        .unwrap_or(defaults.api_token);

    let workspace_id = match optional_lookup_value(&lookup, "TOGGL_WORKSPACE_ID") {
        Some(raw) => Some(parse_number::<u64>(&raw, "TOGGL_WORKSPACE_ID")?),
        None => file.workspace_id,
    };

    let timezone_name = optional_lookup_value(&lookup, "TIMEZONE")
        .or_else(|| non_blank(file.timezone.as_deref()))
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = timezone_name
        .parse::<Tz>()
        .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone '{timezone_name}'")))?;

    let workday_hours = match optional_lookup_value(&lookup, "WORKDAY_HOURS") {
        Some(raw) => parse_number::<f64>(&raw, "WORKDAY_HOURS")?,
        None => file.workday_hours.unwrap_or(defaults.workday_hours),
    };
    if !(workday_hours > 0.0 && workday_hours <= 24.0) {
        return Err(InfraError::InvalidConfig(format!(
            "workday hours must be within (0, 24], got {workday_hours}"
        )));
    }

    let day_start = match optional_lookup_value(&lookup, "DAY_START_TIME")
        .or_else(|| non_blank(file.day_start_time.as_deref()))
    {
        Some(raw) => parse_hhmm(&raw).map_err(InfraError::InvalidConfig)?,
        None => defaults.day_start,
    };

    let billable = match optional_lookup_value(&lookup, "BILLABLE") {
        Some(raw) => raw.eq_ignore_ascii_case("true"),
        None => file.billable.unwrap_or(defaults.billable),
    };

    let time_off_project = optional_lookup_value(&lookup, "TIME_OFF_PROJECT")
        .or_else(|| non_blank(file.time_off_project.as_deref()))
        .unwrap_or(defaults.time_off_project);

    let standup_minutes = match optional_lookup_value(&lookup, "DAILY_STANDUP_MINS") {
        Some(raw) => parse_number::<u32>(&raw, "DAILY_STANDUP_MINS")?,
        None => file.daily_standup_mins.unwrap_or(defaults.standup_minutes),
    };
    ensure_within_day(standup_minutes, "DAILY_STANDUP_MINS")?;

    // an empty DEFAULT_PROJECTS variable clears the file's list
    let default_projects = match lookup("DEFAULT_PROJECTS") {
        Some(raw) => parse_name_list(&raw),
        None => file
            .default_projects
            .clone()
            .map(|names| parse_name_list(&names.join(",")))
            .unwrap_or_default(),
    };

    let break_minutes = match optional_lookup_value(&lookup, "BREAK_MINUTES") {
        Some(raw) => parse_number::<u32>(&raw, "BREAK_MINUTES")?,
        None => file.break_minutes.unwrap_or(defaults.break_minutes),
    };
    ensure_within_day(break_minutes, "BREAK_MINUTES")?;

    let lookback_days = match optional_lookup_value(&lookup, "ACTIVITY_LOOKBACK_DAYS") {
        Some(raw) => parse_number::<u32>(&raw, "ACTIVITY_LOOKBACK_DAYS")?,
        None => file.activity_lookback_days.unwrap_or(defaults.lookback_days),
    };
    if !(1..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        return Err(InfraError::InvalidConfig(format!(
            "activity lookback must be within 1..={MAX_LOOKBACK_DAYS} days, got {lookback_days}"
        )));
    }

    Ok(Settings {
        api_token,
        workspace_id,
        timezone,
        workday_hours,
        day_start,
        billable,
        time_off_project,
        standup_minutes,
        default_projects,
        break_minutes,
        lookback_days,
    })
}

fn optional_lookup_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| non_blank(Some(&value)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, InfraError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| InfraError::InvalidConfig(format!("{key} has invalid value '{raw}'")))
}

fn ensure_within_day(minutes: u32, key: &str) -> Result<(), InfraError> {
    if minutes > MINUTES_PER_DAY {
        return Err(InfraError::InvalidConfig(format!(
            "{key} must be at most {MINUTES_PER_DAY} minutes, got {minutes}"
        )));
    }
    Ok(())
}

fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
