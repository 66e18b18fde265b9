use crate::application::console::Console;
use crate::application::day_filler::{FillContext, FillOutcome, fill_day};
use crate::application::session::Session;
use crate::domain::analyzer::{DayTotals, analyze_month, entries_on, working_days};
use crate::domain::breaks::StepSource;
use crate::domain::models::format_duration;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::toggl_client::TimeTrackingClient;
use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use chrono_tz::Tz;
use tracing::info;

/// Local hour from which today counts as a finished day.
pub const ASSESSABLE_FROM_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    NotYetAssessable,
    Over { total: i64, excess: i64 },
    Met { total: i64 },
    Under { total: i64, shortfall: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayAssessment {
    pub date: NaiveDate,
    pub status: DayStatus,
}

/// Working days of `now`'s month up to today, each against the workday target.
pub fn classify_month(
    totals: &DayTotals,
    now: DateTime<Tz>,
    workday_seconds: i64,
) -> Vec<DayAssessment> {
    let today = now.date_naive();
    working_days(today.year(), today.month())
        .into_iter()
        .take_while(|date| *date <= today)
        .map(|date| {
            let total = totals.get(&date).copied().unwrap_or(0);
            let status = if date == today && now.hour() < ASSESSABLE_FROM_HOUR {
                DayStatus::NotYetAssessable
            } else if total > workday_seconds {
                DayStatus::Over {
                    total,
                    excess: total - workday_seconds,
                }
            } else if total == workday_seconds {
                DayStatus::Met { total }
            } else {
                DayStatus::Under {
                    total,
                    shortfall: workday_seconds - total,
                }
            };
            DayAssessment { date, status }
        })
        .collect()
}

fn overview_line(assessment: &DayAssessment) -> String {
    let label = assessment.date.format("%a %d");
    match assessment.status {
        DayStatus::NotYetAssessable => format!("  {label}  -  (today, skipping - not yet 6 PM)"),
        DayStatus::Over { total, excess } => format!(
            "  {label}  !!  {}  -> OVER by {}",
            format_duration(total),
            format_duration(excess)
        ),
        DayStatus::Met { total } => format!("  {label}  ✓  {}", format_duration(total)),
        DayStatus::Under { total, shortfall } => format!(
            "  {label}  ✗  {}  -> needs {}",
            format_duration(total),
            format_duration(shortfall)
        ),
    }
}

/// Fills every under-budget working day of the current month, one after another.
///
/// Entries are fetched once for the month; activities and projects once for the session.
pub async fn run_month_fill<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    steps: &mut dyn StepSource,
) -> Result<Vec<(NaiveDate, FillOutcome)>, InfraError>
where
    C: TimeTrackingClient,
{
    let now = session.now();
    let (year, month) = (now.year(), now.month());

    console.say("");
    console.say(&format!("== {} ==", now.format("%B %Y")));
    console.say("  Fetching month entries from Toggl...");
    let entries = session.entries_for_month(year, month).await?;
    let totals = analyze_month(&entries, year, month, session.tz());
    let assessments = classify_month(&totals, now, session.settings().workday_seconds());

    for assessment in &assessments {
        console.say(&overview_line(assessment));
    }
    let over = assessments
        .iter()
        .filter(|assessment| matches!(assessment.status, DayStatus::Over { .. }))
        .count();
    let under: Vec<NaiveDate> = assessments
        .iter()
        .filter(|assessment| matches!(assessment.status, DayStatus::Under { .. }))
        .map(|assessment| assessment.date)
        .collect();
    console.say(&"-".repeat(44));
    console.say(&format!("  {over} day(s) over, {} day(s) to fill", under.len()));
    info!(year, month, over, under = under.len(), "month assessed");

    if under.is_empty() {
        console.say("");
        console.say("  All days complete!");
        return Ok(Vec::new());
    }

    console.say("");
    console.say("  Fetching recent activities from Toggl...");
    let activities = session.recent_activities().await?;
    let projects = session.projects().await?;
    if activities.is_empty() {
        console.say("  No past activities found. You'll be prompted for custom tasks.");
    }

    let context = FillContext {
        activities: &activities,
        projects: &projects,
    };
    let mut outcomes = Vec::with_capacity(under.len());
    for date in under {
        let existing = entries_on(&entries, date, session.tz());
        let outcome = fill_day(session, date, &existing, context, console, steps).await;
        outcomes.push((date, outcome));
    }

    console.say("");
    console.say("  Month fill complete.");
    Ok(outcomes)
}
