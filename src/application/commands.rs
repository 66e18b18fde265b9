use crate::application::console::Console;
use crate::application::day_filler::{
    FillContext, assign_start_times, confirm, fill_day, schedule_cursor,
};
use crate::application::month_fill::run_month_fill;
use crate::application::project_picker::pick_project;
use crate::application::session::Session;
use crate::domain::analyzer::{month_usage, working_days};
use crate::domain::breaks::StepSource;
use crate::domain::models::{
    AllocationInput, MAX_ENTRY_HOURS, ScheduleBlock, ScheduledBlock, TIME_OFF_DESCRIPTION,
    format_duration, hours_to_seconds, local_instant, parse_date, parse_hours, parse_year_month,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_cache::KEY_LAST_FILLED_DATE;
use crate::infrastructure::toggl_client::TimeTrackingClient;
use chrono::{Datelike, NaiveDate};
use tracing::{error, info, warn};

const RULE_WIDTH: usize = 54;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    FillMonth,
    FillDate,
    LogTasks,
    Today,
    Projects,
    DayOff,
    Report,
    Quit,
    Unknown,
}

impl MenuChoice {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" => Self::FillMonth,
            "2" => Self::FillDate,
            "3" => Self::LogTasks,
            "4" => Self::Today,
            "5" => Self::Projects,
            "6" => Self::DayOff,
            "7" => Self::Report,
            "q" | "quit" | "exit" => Self::Quit,
            _ => Self::Unknown,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::FillMonth => "fill_month",
            Self::FillDate => "fill_date",
            Self::LogTasks => "log_tasks",
            Self::Today => "today",
            Self::Projects => "projects",
            Self::DayOff => "day_off",
            Self::Report => "report",
            Self::Quit => "quit",
            Self::Unknown => "unknown",
        }
    }
}

const MENU: &[&str] = &[
    "  [1] Fill incomplete days this month",
    "  [2] Fill a specific date",
    "  [3] Log hours for recent tasks",
    "  [4] View today's Toggl entries",
    "  [5] View Toggl projects",
    "  [6] Mark a day off",
    "  [7] Monthly report",
    "  [q] Quit",
];

fn heading(console: &mut dyn Console, title: &str) {
    console.say("");
    console.say(&format!("== {title} =="));
}

/// Uses the value given on the command line, otherwise asks.
fn answer_or_ask(console: &mut dyn Console, preset: Option<&str>, prompt: &str) -> String {
    match preset {
        Some(value) => value.trim().to_string(),
        None => console.ask(prompt),
    }
}

/// Blank means `today`; anything unparseable is reported and yields `None`.
fn date_or_today(
    console: &mut dyn Console,
    preset: Option<&str>,
    prompt: &str,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let raw = answer_or_ask(console, preset, prompt);
    if raw.is_empty() {
        return Some(today);
    }
    match parse_date(&raw) {
        Ok(date) => Some(date),
        Err(_) => {
            console.say("  Invalid date.");
            None
        }
    }
}

/// Logs a failed action and tells the user; the menu keeps running.
pub fn report_error(console: &mut dyn Console, command: &str, error: &InfraError) {
    error!(command, %error, "command failed");
    console.say(&format!("  Error: {error}"));
}

pub fn print_banner(console: &mut dyn Console, last_filled: Option<&str>) {
    console.say("");
    console.say(&"=".repeat(RULE_WIDTH));
    console.say("  Toggl Auto-Fill CLI");
    console.say(&"=".repeat(RULE_WIDTH));
    if let Some(date) = last_filled {
        console.say(&format!("  Last filled day: {date}"));
    }
}

pub async fn fill_date<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    steps: &mut dyn StepSource,
    preset: Option<&str>,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    heading(console, "Fill a Specific Date");
    let raw = answer_or_ask(console, preset, "  Enter date (YYYY-MM-DD): ");
    let Ok(date) = parse_date(&raw) else {
        console.say("  Invalid date.");
        return Ok(());
    };

    let existing = session.entries_for_date(date).await?;
    let activities = session.recent_activities().await?;
    let projects = session.projects().await?;
    let context = FillContext {
        activities: &activities,
        projects: &projects,
    };
    let outcome = fill_day(session, date, &existing, context, console, steps).await;
    info!(%date, ?outcome, "fill date finished");
    Ok(())
}

/// Explicit hours per recent task, laid out from the first free instant of the day.
pub async fn log_task_hours<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    preset_date: Option<&str>,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    heading(console, "Log Hours for Recent Tasks");
    let activities = session.recent_activities().await?;
    if activities.is_empty() {
        console.say("  No past activities found in Toggl.");
        return Ok(());
    }

    let projects = session.projects().await?;
    let Some(date) = date_or_today(
        console,
        preset_date,
        "  Which date to log for? (YYYY-MM-DD, blank = today): ",
        session.today(),
    ) else {
        return Ok(());
    };

    console.say("");
    console.say(&format!(
        "  Tasks from your last {} days in Toggl. Enter hours or H:mm for each (0 to skip):",
        session.settings().lookback_days
    ));
    let settings = session.settings();
    let mut blocks = Vec::new();
    for task in &activities {
        let answer = console.ask(&format!("  '{task}' - hours or H:mm (0 to skip): "));
        let hours = match AllocationInput::parse(&answer) {
            AllocationInput::Hours(hours) if hours <= MAX_ENTRY_HOURS => hours,
            AllocationInput::Hours(_) => {
                console.say(&format!("  More than {MAX_ENTRY_HOURS}h, skipping."));
                continue;
            }
            _ => continue,
        };
        let project_id = pick_project(console, &projects, &settings.default_projects, task);
        blocks.push(ScheduleBlock::work(
            task.as_str(),
            hours_to_seconds(hours),
            project_id,
            settings.billable,
        ));
    }

    if blocks.is_empty() {
        console.say("  Nothing to log.");
        return Ok(());
    }

    let existing = session.entries_for_date(date).await?;
    let scheduled = assign_start_times(blocks, schedule_cursor(settings, date, &existing));
    let total: i64 = scheduled.iter().map(|item| item.block.duration).sum();
    console.say("");
    console.say(&format!(
        "  Total: {:.1}h across {} task(s).",
        total as f64 / 3600.0,
        scheduled.len()
    ));
    if !confirm(console, "  Push to Toggl? (y/N): ") {
        console.say("  Cancelled.");
        return Ok(());
    }

    for item in &scheduled {
        match session.create_entry(item).await {
            Ok(_) => console.say(&format!("  ✓ '{}' logged.", item.block.description)),
            Err(error) => {
                warn!(%date, description = %item.block.description, %error, "time entry rejected");
                console.say(&format!("  ✗ '{}': {error}", item.block.description));
            }
        }
    }
    Ok(())
}

pub async fn check_today<C>(
    session: &Session<C>,
    console: &mut dyn Console,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    heading(console, "Today's Toggl Entries");
    let entries = session.entries_for_date(session.today()).await?;
    if entries.is_empty() {
        console.say("  No entries yet today.");
        return Ok(());
    }

    let mut total = 0;
    for entry in &entries {
        let seconds = entry.logged_seconds();
        let description = match entry.description() {
            "" => "(no description)",
            description => description,
        };
        console.say(&format!("  • {description} - {}m", seconds / 60));
        total += seconds;
    }
    console.say("");
    console.say(&format!(
        "  Total logged: {} / {}",
        format_duration(total),
        format_duration(session.settings().workday_seconds())
    ));
    Ok(())
}

pub async fn view_projects<C>(
    session: &Session<C>,
    console: &mut dyn Console,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    heading(console, "Your Toggl Projects");
    let projects = session.projects().await?;
    if projects.is_empty() {
        console.say("  No projects found.");
        return Ok(());
    }
    for project in projects.iter() {
        console.say(&format!("  [{}] {}", project.id, project.name));
    }
    Ok(())
}

/// One non-billable "Time Off" entry at the configured day start.
pub async fn day_off<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    preset_date: Option<&str>,
    preset_hours: Option<&str>,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    heading(console, "Mark a Day Off");
    let settings = session.settings();
    let Some(date) = date_or_today(
        console,
        preset_date,
        "  Date (YYYY-MM-DD, blank = today): ",
        session.today(),
    ) else {
        return Ok(());
    };

    let raw_hours = answer_or_ask(
        console,
        preset_hours,
        &format!("  Hours (blank = {}h): ", settings.workday_hours),
    );
    let seconds = if raw_hours.is_empty() {
        settings.workday_seconds()
    } else {
        match parse_hours(&raw_hours) {
            Ok(hours) if hours > 0.0 && hours <= MAX_ENTRY_HOURS => hours_to_seconds(hours),
            _ => {
                console.say("  Invalid hours.");
                return Ok(());
            }
        }
    };

    let projects = session.projects().await?;
    let project_id = projects.get(&settings.time_off_project);
    if project_id.is_none() {
        warn!(project = %settings.time_off_project, "time-off project not found");
        console.say(&format!(
            "  Warning: project '{}' not found - logging without project.",
            settings.time_off_project
        ));
    }

    let scheduled = ScheduledBlock {
        start: local_instant(settings.timezone, date, settings.day_start),
        block: ScheduleBlock::work(TIME_OFF_DESCRIPTION, seconds, project_id, false),
    };
    console.say("");
    console.say(&format!(
        "  Will log {} as '{TIME_OFF_DESCRIPTION}' on {} (not billable)",
        format_duration(seconds),
        date.format("%a %d %b")
    ));
    if project_id.is_some() {
        console.say(&format!("  Project: {}", settings.time_off_project));
    }
    if !confirm(console, "  Push to Toggl? (y/N): ") {
        console.say("  Cancelled.");
        return Ok(());
    }

    session.create_entry(&scheduled).await?;
    console.say("  Done.");
    Ok(())
}

/// `—` for an empty day, `✓` when the target is met, otherwise the shortfall.
pub fn report_status(total: i64, target: i64) -> String {
    if total == 0 {
        "—".to_string()
    } else if total >= target {
        "✓".to_string()
    } else {
        format!("⚠ {} short", format_duration(target - total))
    }
}

pub async fn monthly_report<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    preset_month: Option<&str>,
) -> Result<(), InfraError>
where
    C: TimeTrackingClient,
{
    let today = session.today();
    let raw = answer_or_ask(
        console,
        preset_month,
        &format!("\n  Month [YYYY-MM, Enter={}]: ", today.format("%Y-%m")),
    );
    let (year, month) = if raw.is_empty() {
        (today.year(), today.month())
    } else {
        match parse_year_month(&raw) {
            Ok(parsed) => parsed,
            Err(_) => {
                console.say("  Invalid format. Use YYYY-MM.");
                return Ok(());
            }
        }
    };
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        console.say("  Invalid format. Use YYYY-MM.");
        return Ok(());
    };

    heading(console, &format!("Monthly Report: {}", first.format("%B %Y")));
    let entries = session.entries_for_month(year, month).await?;
    let usage = month_usage(&entries, year, month, session.tz());
    let target = session.settings().workday_seconds();

    let mut grand_total = 0;
    let mut grand_billable = 0;
    for date in working_days(year, month) {
        let day = usage.get(&date).copied().unwrap_or_default();
        grand_total += day.total;
        grand_billable += day.billable;
        console.say(&format!(
            "  {}  |  {:>8}  |  billable {:>8}  |  {}",
            date.format("%a %d"),
            format_duration(day.total),
            format_duration(day.billable),
            report_status(day.total, target)
        ));
    }
    console.say("");
    console.say(&format!("  Total hours:    {}", format_duration(grand_total)));
    console.say(&format!("  Billable hours: {}", format_duration(grand_billable)));
    Ok(())
}

/// Interactive loop until the user quits. Failed actions are reported and the loop continues.
pub async fn run_menu<C>(
    session: &Session<C>,
    console: &mut dyn Console,
    steps: &mut dyn StepSource,
) where
    C: TimeTrackingClient,
{
    print_banner(console, session.recall(KEY_LAST_FILLED_DATE).as_deref());
    loop {
        console.say("");
        for line in MENU {
            console.say(line);
        }
        console.say("");
        let answer = console.ask("  Choose: ");
        let choice = if console.is_closed() {
            MenuChoice::Quit
        } else {
            MenuChoice::parse(&answer)
        };
        let result = match choice {
            MenuChoice::FillMonth => run_month_fill(session, console, steps).await.map(|_| ()),
            MenuChoice::FillDate => fill_date(session, console, steps, None).await,
            MenuChoice::LogTasks => log_task_hours(session, console, None).await,
            MenuChoice::Today => check_today(session, console).await,
            MenuChoice::Projects => view_projects(session, console).await,
            MenuChoice::DayOff => day_off(session, console, None, None).await,
            MenuChoice::Report => monthly_report(session, console, None).await,
            MenuChoice::Quit => {
                console.say("");
                console.say("  Bye!");
                return;
            }
            MenuChoice::Unknown => {
                console.say("  Unknown option.");
                Ok(())
            }
        };
        if let Err(error) = result {
            report_error(console, choice.name(), &error);
        }
    }
}
