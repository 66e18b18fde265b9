use crate::domain::models::TimeEntry;
use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashSet};

pub type DayTotals = BTreeMap<NaiveDate, i64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayUsage {
    pub total: i64,
    pub billable: i64,
}

/// Worked seconds per local date of `year`-`month`, break markers and running timers excluded.
pub fn analyze_month(entries: &[TimeEntry], year: i32, month: u32, tz: Tz) -> DayTotals {
    month_usage(entries, year, month, tz)
        .into_iter()
        .map(|(date, usage)| (date, usage.total))
        .collect()
}

/// Same buckets as [`analyze_month`], with the billable share tracked alongside.
pub fn month_usage(
    entries: &[TimeEntry],
    year: i32,
    month: u32,
    tz: Tz,
) -> BTreeMap<NaiveDate, DayUsage> {
    let mut usage: BTreeMap<NaiveDate, DayUsage> = BTreeMap::new();
    for entry in entries {
        if entry.is_running() || entry.is_break_marker() {
            continue;
        }
        let Some(date) = entry.local_date(tz) else {
            continue;
        };
        // entries near midnight may belong to the neighbouring month once localized
        if date.year() != year || date.month() != month {
            continue;
        }
        let day = usage.entry(date).or_default();
        day.total += entry.duration;
        if entry.billable {
            day.billable += entry.duration;
        }
    }
    usage
}

/// Distinct descriptions, newest first.
pub fn recent_activities(entries: &[TimeEntry]) -> Vec<String> {
    let mut ordered: Vec<&TimeEntry> = entries.iter().collect();
    ordered.sort_by(|left, right| {
        let left = left.start_in(Tz::UTC);
        let right = right.start_in(Tz::UTC);
        right.cmp(&left)
    });

    let mut seen = HashSet::new();
    let mut activities = Vec::new();
    for entry in ordered {
        let description = entry.description().trim();
        if description.is_empty() {
            continue;
        }
        let lowered = description.to_lowercase();
        if lowered == "break" || lowered == "daily" {
            continue;
        }
        if seen.insert(description.to_string()) {
            activities.push(description.to_string());
        }
    }
    activities
}

pub fn entries_on(entries: &[TimeEntry], date: NaiveDate, tz: Tz) -> Vec<TimeEntry> {
    entries
        .iter()
        .filter(|entry| entry.local_date(tz) == Some(date))
        .cloned()
        .collect()
}

/// Seconds already logged, break markers excluded and running timers counted as zero.
pub fn logged_work_seconds(entries: &[TimeEntry]) -> i64 {
    entries
        .iter()
        .filter(|entry| !entry.is_break_marker())
        .map(TimeEntry::logged_seconds)
        .sum()
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|first| first.pred_opt())
}

/// Monday-Friday dates of the month.
pub fn working_days(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|date| date.month() == month)
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
