use crate::application::console::Console;
use crate::application::project_picker::pick_project;
use crate::application::session::Session;
use crate::domain::analyzer::logged_work_seconds;
use crate::domain::breaks::{StepSource, insert_breaks};
use crate::domain::models::{
    AllocationInput, Confirmation, ProjectMap, STANDUP_DESCRIPTION, ScheduleBlock, ScheduledBlock,
    TimeEntry, format_duration, hours_to_seconds, local_instant,
};
use crate::infrastructure::config::Settings;
use crate::infrastructure::session_cache::KEY_LAST_FILLED_DATE;
use crate::infrastructure::toggl_client::TimeTrackingClient;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::{info, warn};

/// Session-wide inputs shared by every day being filled.
#[derive(Debug, Clone, Copy)]
pub struct FillContext<'a> {
    pub activities: &'a [String],
    pub projects: &'a ProjectMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub already_logged: i64,
    pub blocks: Vec<ScheduledBlock>,
}

impl DayPlan {
    pub fn work_blocks(&self) -> impl Iterator<Item = &ScheduledBlock> {
        self.blocks.iter().filter(|scheduled| !scheduled.block.is_break)
    }

    pub fn new_work_seconds(&self) -> i64 {
        self.work_blocks().map(|scheduled| scheduled.block.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    NothingToFill,
    NoEntriesProduced,
    Planned(DayPlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    NothingToFill,
    NoEntriesProduced,
    UserCancelled,
    Submitted { created: usize, attempted: usize },
}

/// Running budget while blocks are being proposed.
struct Allocator<'a> {
    settings: &'a Settings,
    projects: &'a ProjectMap,
    remaining: i64,
    blocks: Vec<ScheduleBlock>,
}

impl<'a> Allocator<'a> {
    /// Queues up to `requested` seconds of `description`, capped to what is left.
    fn allocate(&mut self, console: &mut dyn Console, description: &str, requested: i64) {
        let seconds = requested.min(self.remaining);
        if seconds <= 0 {
            return;
        }
        let project_id = pick_project(
            console,
            self.projects,
            &self.settings.default_projects,
            description,
        );
        self.blocks.push(ScheduleBlock::work(
            description,
            seconds,
            project_id,
            self.settings.billable,
        ));
        self.remaining -= seconds;
    }

    fn allocate_standup(&mut self, console: &mut dyn Console, existing: &[TimeEntry]) {
        if self.settings.standup_minutes == 0 || existing.iter().any(TimeEntry::is_standup) {
            return;
        }
        self.allocate(console, STANDUP_DESCRIPTION, self.settings.standup_seconds());
    }

    fn allocate_activities(&mut self, console: &mut dyn Console, activities: &[String]) {
        for activity in activities {
            if self.remaining <= 0 {
                break;
            }
            let answer = console.ask(&format!(
                "  '{activity}' - hours or H:mm (Enter=fill {} remaining, 0=skip): ",
                format_duration(self.remaining)
            ));
            match AllocationInput::parse(&answer) {
                AllocationInput::FillRemaining => {
                    self.allocate(console, activity, self.remaining);
                    break;
                }
                AllocationInput::Skip => {}
                AllocationInput::Hours(hours) => {
                    self.allocate(console, activity, hours_to_seconds(hours));
                }
                AllocationInput::Invalid => console.say("  Invalid input, skipping."),
            }
        }
    }

    fn allocate_freeform(&mut self, console: &mut dyn Console) {
        if self.remaining <= 0 {
            return;
        }
        console.say("");
        let description = console.ask(&format!(
            "  {} still unaccounted. Add a custom task (or press Enter to skip day): ",
            format_duration(self.remaining)
        ));
        if !description.is_empty() {
            self.allocate(console, &description, self.remaining);
        }
    }
}

/// First free instant of the day: the configured start, or the end of the latest entry.
pub fn schedule_cursor(
    settings: &Settings,
    date: NaiveDate,
    existing: &[TimeEntry],
) -> DateTime<Tz> {
    let tz = settings.timezone;
    existing
        .iter()
        .filter_map(|entry| entry.end_in(tz))
        .fold(local_instant(tz, date, settings.day_start), |cursor, end| {
            cursor.max(end)
        })
}

/// Stamps blocks back to back starting at `cursor`.
pub fn assign_start_times(blocks: Vec<ScheduleBlock>, cursor: DateTime<Tz>) -> Vec<ScheduledBlock> {
    let mut cursor = cursor;
    blocks
        .into_iter()
        .map(|block| {
            let scheduled = ScheduledBlock {
                start: cursor,
                block,
            };
            cursor = scheduled.end();
            scheduled
        })
        .collect()
}

/// Proposes blocks that bring `date` up to the workday target.
///
/// Returns before prompting anything when the day is already complete.
pub fn plan_day(
    settings: &Settings,
    date: NaiveDate,
    existing: &[TimeEntry],
    context: FillContext<'_>,
    console: &mut dyn Console,
    steps: &mut dyn StepSource,
) -> PlanOutcome {
    let already_logged = logged_work_seconds(existing);
    let remaining = settings.workday_seconds() - already_logged;
    if remaining <= 0 {
        info!(%date, already_logged, "day already complete");
        return PlanOutcome::NothingToFill;
    }

    console.say("");
    console.say(&format!(
        "  -- {} - {} to fill --",
        date.format("%A %d %b"),
        format_duration(remaining)
    ));

    let mut allocator = Allocator {
        settings,
        projects: context.projects,
        remaining,
        blocks: Vec::new(),
    };
    allocator.allocate_standup(console, existing);
    allocator.allocate_activities(console, context.activities);
    allocator.allocate_freeform(console);

    if allocator.blocks.is_empty() {
        console.say("  Skipping day - no entries to add.");
        return PlanOutcome::NoEntriesProduced;
    }

    let blocks = insert_breaks(allocator.blocks, settings.break_seconds(), steps);
    let cursor = schedule_cursor(settings, date, existing);
    PlanOutcome::Planned(DayPlan {
        date,
        already_logged,
        blocks: assign_start_times(blocks, cursor),
    })
}

pub fn render_preview(plan: &DayPlan, console: &mut dyn Console) {
    console.say("");
    console.say(&format!("  Planned for {}:", plan.date.format("%a %d %b")));
    for scheduled in &plan.blocks {
        console.say(&format!(
            "    {} | {:3}m | {}",
            scheduled.start.format("%H:%M"),
            scheduled.block.duration / 60,
            scheduled.block.description
        ));
    }
    let added = plan.new_work_seconds();
    console.say(&format!(
        "  Total: {}  (was {}, adding {})",
        format_duration(plan.already_logged + added),
        format_duration(plan.already_logged),
        format_duration(added)
    ));
}

/// Reads a y/N answer; anything unrecognized counts as no.
pub fn confirm(console: &mut dyn Console, prompt: &str) -> bool {
    match Confirmation::parse(&console.ask(prompt)) {
        Confirmation::Yes => true,
        Confirmation::No => false,
        Confirmation::Invalid => {
            console.say("  Unrecognized answer, treating as no.");
            false
        }
    }
}

/// Creates every non-break block; a failed entry does not stop the ones after it.
pub async fn submit_plan<C>(
    session: &Session<C>,
    plan: &DayPlan,
    console: &mut dyn Console,
) -> FillOutcome
where
    C: TimeTrackingClient,
{
    let mut created = 0;
    let mut attempted = 0;
    for scheduled in plan.work_blocks() {
        attempted += 1;
        match session.create_entry(scheduled).await {
            Ok(_) => created += 1,
            Err(error) => {
                warn!(
                    date = %plan.date,
                    description = %scheduled.block.description,
                    %error,
                    "time entry rejected"
                );
                console.say(&format!(
                    "  ✗ Failed '{}': {error}",
                    scheduled.block.description
                ));
            }
        }
    }
    console.say(&format!("  Created {created}/{attempted} entries."));
    if created > 0 {
        session.remember(KEY_LAST_FILLED_DATE, &plan.date.to_string());
    }
    FillOutcome::Submitted { created, attempted }
}

/// Plans, previews, confirms and submits one day.
pub async fn fill_day<C>(
    session: &Session<C>,
    date: NaiveDate,
    existing: &[TimeEntry],
    context: FillContext<'_>,
    console: &mut dyn Console,
    steps: &mut dyn StepSource,
) -> FillOutcome
where
    C: TimeTrackingClient,
{
    let plan = match plan_day(session.settings(), date, existing, context, console, steps) {
        PlanOutcome::NothingToFill => return FillOutcome::NothingToFill,
        PlanOutcome::NoEntriesProduced => return FillOutcome::NoEntriesProduced,
        PlanOutcome::Planned(plan) => plan,
    };

    render_preview(&plan, console);
    if !confirm(console, "\n  Push to Toggl? (y/N): ") {
        console.say("  Cancelled.");
        info!(%date, "day fill cancelled");
        return FillOutcome::UserCancelled;
    }

    let outcome = submit_plan(session, &plan, console).await;
    info!(%date, ?outcome, "day fill finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeClient, FixedSteps, ScriptedConsole, entry, project, test_session, test_settings,
    };
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn activities(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn context<'a>(activities: &'a [String], projects: &'a ProjectMap) -> FillContext<'a> {
        FillContext {
            activities,
            projects,
        }
    }

    fn local_hhmm(scheduled: &ScheduledBlock) -> String {
        scheduled.start.format("%H:%M").to_string()
    }

    fn planned(outcome: PlanOutcome) -> DayPlan {
        match outcome {
            PlanOutcome::Planned(plan) => plan,
            other => panic!("expected a plan, got {other:?}"),
        }
    }

    fn assert_contiguous(blocks: &[ScheduledBlock]) {
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end());
        }
    }

    #[tokio::test]
    async fn standup_and_fill_remaining_produce_full_day_with_breaks() {
        let client = Arc::new(FakeClient::default());
        let session = test_session(Arc::clone(&client), test_settings());
        let names = activities(&["Design review"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["", "y"]);
        let mut steps = FixedSteps::new(vec![]);

        let fill_context = context(&names, &projects);
        let plan = planned(plan_day(
            session.settings(),
            monday(),
            &[],
            fill_context,
            &mut console,
            &mut steps,
        ));

        assert_eq!(local_hhmm(&plan.blocks[0]), "09:15");
        assert_eq!(plan.blocks[0].block.description, "Daily");
        assert_eq!(plan.blocks[0].block.duration, 900);
        assert_eq!(local_hhmm(&plan.blocks[1]), "09:30");
        assert_eq!(plan.blocks[1].block.description, "Design review");

        let review_seconds: i64 = plan
            .work_blocks()
            .filter(|scheduled| scheduled.block.description == "Design review")
            .map(|scheduled| scheduled.block.duration)
            .sum();
        assert_eq!(review_seconds, 27_900);
        assert!(
            plan.blocks
                .iter()
                .any(|scheduled| scheduled.block.is_break && scheduled.block.duration == 900)
        );
        assert_eq!(plan.already_logged + plan.new_work_seconds(), 28_800);
        assert_contiguous(&plan.blocks);

        // the same flow end to end, with submission
        let mut console = ScriptedConsole::new(&["", "y"]);
        let mut steps = FixedSteps::new(vec![]);
        let outcome = fill_day(
            &session,
            monday(),
            &[],
            fill_context,
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(
            outcome,
            FillOutcome::Submitted {
                created: 4,
                attempted: 4,
            }
        );
        let created = client.created();
        let starts: Vec<&str> = created.iter().map(|request| request.start.as_str()).collect();
        assert_eq!(
            starts,
            vec![
                "2026-02-16T08:15:00Z",
                "2026-02-16T08:30:00Z",
                "2026-02-16T11:45:00Z",
                "2026-02-16T15:00:00Z",
            ]
        );
        assert!(created.iter().all(|request| request.description != "Break"));
        assert_eq!(created.iter().map(|request| request.duration).sum::<i64>(), 28_800);
        assert!(console.output().contains("Total: 8h  (was 0m, adding 8h)"));
        assert!(console.output().contains("Created 4/4 entries."));
        assert_eq!(session.recall(KEY_LAST_FILLED_DATE), Some("2026-02-16".to_string()));
    }

    #[tokio::test]
    async fn complete_day_makes_no_prompts_and_no_calls() {
        let client = Arc::new(FakeClient::default());
        let session = test_session(Arc::clone(&client), test_settings());
        let existing = vec![
            entry("Coding", "2026-02-16T08:15:00Z", 14_400),
            entry("Review", "2026-02-16T12:15:00Z", 14_400),
        ];
        let names = activities(&["Coding"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["1", "y"]);
        let mut steps = FixedSteps::new(vec![]);

        let outcome = fill_day(
            &session,
            monday(),
            &existing,
            context(&names, &projects),
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(outcome, FillOutcome::NothingToFill);
        assert!(console.prompts.is_empty());
        assert!(console.lines.is_empty());
        assert!(client.created().is_empty());
        assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_hours_are_capped_skips_and_invalid_answers_are_ignored() {
        let mut settings = test_settings();
        settings.standup_minutes = 0;
        let names = activities(&["Skipped", "Garbled", "Coding", "Never asked"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["0", "two hours", "10"]);
        let mut steps = FixedSteps::new(vec![8]);

        let plan = planned(plan_day(
            &settings,
            monday(),
            &[entry("Earlier", "2026-02-16T08:15:00Z", 3_600)],
            context(&names, &projects),
            &mut console,
            &mut steps,
        ));

        assert_eq!(console.prompts.len(), 3);
        assert!(console.output().contains("Invalid input, skipping."));
        assert_eq!(plan.new_work_seconds(), 25_200);
        assert!(plan.work_blocks().all(|scheduled| scheduled.block.description == "Coding"));
        // cursor starts where the earlier entry ended
        assert_eq!(local_hhmm(&plan.blocks[0]), "10:15");
        assert_contiguous(&plan.blocks);
    }

    #[tokio::test]
    async fn freeform_absorbs_remainder_and_decline_cancels() {
        let client = Arc::new(FakeClient::default());
        let mut settings = test_settings();
        settings.standup_minutes = 0;
        let session = test_session(Arc::clone(&client), settings);
        let names = activities(&["Coding"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["1:30", "Support rotation", "n"]);
        let mut steps = FixedSteps::new(vec![]);

        let plan = planned(plan_day(
            session.settings(),
            monday(),
            &[],
            context(&names, &projects),
            &mut ScriptedConsole::new(&["1:30", "Support rotation"]),
            &mut FixedSteps::new(vec![]),
        ));
        let support: i64 = plan
            .work_blocks()
            .filter(|scheduled| scheduled.block.description == "Support rotation")
            .map(|scheduled| scheduled.block.duration)
            .sum();
        assert_eq!(support, 28_800 - 5_400);

        let outcome = fill_day(
            &session,
            monday(),
            &[],
            context(&names, &projects),
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(outcome, FillOutcome::UserCancelled);
        assert!(client.created().is_empty());
        assert!(console.output().contains("Cancelled."));
    }

    #[tokio::test]
    async fn unrecognized_confirmation_cancels() {
        let client = Arc::new(FakeClient::default());
        let session = test_session(Arc::clone(&client), test_settings());
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["Support", "sure"]);
        let mut steps = FixedSteps::new(vec![]);

        let outcome = fill_day(
            &session,
            monday(),
            &[],
            context(&[], &projects),
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(outcome, FillOutcome::UserCancelled);
        assert!(console.output().contains("Unrecognized answer"));
        assert!(client.created().is_empty());
    }

    #[test]
    fn skipping_everything_produces_no_entries() {
        let mut settings = test_settings();
        settings.standup_minutes = 0;
        let names = activities(&["Coding"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["0", ""]);
        let mut steps = FixedSteps::new(vec![]);

        let outcome = plan_day(
            &settings,
            monday(),
            &[],
            context(&names, &projects),
            &mut console,
            &mut steps,
        );

        assert_eq!(outcome, PlanOutcome::NoEntriesProduced);
        assert_eq!(console.prompts.len(), 2);
    }

    #[test]
    fn existing_standup_suppresses_daily_and_cursor_follows_latest_entry() {
        let settings = test_settings();
        let existing = vec![
            entry("daily", "2026-02-16T08:15:00Z", 900),
            entry("Coding", "2026-02-16T08:30:00Z", 7_200),
            entry("Running", "2026-02-16T13:00:00Z", -1),
        ];
        let names = activities(&["Coding"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&[""]);
        let mut steps = FixedSteps::new(vec![8]);

        let plan = planned(plan_day(
            &settings,
            monday(),
            &existing,
            context(&names, &projects),
            &mut console,
            &mut steps,
        ));

        assert_eq!(plan.already_logged, 8_100);
        assert!(plan.work_blocks().all(|scheduled| scheduled.block.description == "Coding"));
        assert_eq!(local_hhmm(&plan.blocks[0]), "11:30");
        assert_eq!(plan.blocks[0].block.duration, 7_200);
        assert_eq!(plan.new_work_seconds(), 28_800 - 8_100);
    }

    #[test]
    fn standup_is_capped_to_remaining_budget() {
        let settings = test_settings();
        let existing = vec![entry("Coding", "2026-02-16T08:15:00Z", 28_200)];
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&[]);
        let mut steps = FixedSteps::new(vec![]);

        let plan = planned(plan_day(
            &settings,
            monday(),
            &existing,
            context(&[], &projects),
            &mut console,
            &mut steps,
        ));

        assert_eq!(plan.blocks.len(), 1);
        assert_eq!(plan.blocks[0].block.description, "Daily");
        assert_eq!(plan.blocks[0].block.duration, 600);
        assert!(console.prompts.is_empty());
    }

    #[tokio::test]
    async fn project_choices_are_attached_to_blocks() {
        let client = Arc::new(FakeClient::default());
        let session = test_session(Arc::clone(&client), test_settings());
        let projects = ProjectMap::new(vec![
            project(1, "Acme"),
            project(2, "Internal"),
        ]);
        let names = activities(&["Coding"]);
        // Daily -> Internal, Coding 1h -> Acme, custom task -> no project
        let mut console = ScriptedConsole::new(&["2", "1", "1", "Support", "nope", "y"]);
        let mut steps = FixedSteps::new(vec![]);

        let outcome = fill_day(
            &session,
            monday(),
            &[],
            context(&names, &projects),
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(
            outcome,
            FillOutcome::Submitted {
                created: 5,
                attempted: 5,
            }
        );
        let created = client.created();
        assert_eq!(created[0].description, "Daily");
        assert_eq!(created[0].project_id, Some(2));
        assert_eq!(created[1].description, "Coding");
        assert_eq!(created[1].project_id, Some(1));
        assert!(
            created[2..]
                .iter()
                .all(|request| request.description == "Support" && request.project_id.is_none())
        );
        assert_eq!(console.unanswered(), 0);
    }

    #[tokio::test]
    async fn failed_entries_are_reported_and_siblings_still_submit() {
        let client = Arc::new(FakeClient::default().failing_on("Daily"));
        let mut settings = test_settings();
        settings.workday_hours = 1.0;
        let session = test_session(Arc::clone(&client), settings);
        let names = activities(&["Coding"]);
        let projects = ProjectMap::default();
        let mut console = ScriptedConsole::new(&["", "y"]);
        let mut steps = FixedSteps::new(vec![]);

        let outcome = fill_day(
            &session,
            monday(),
            &[],
            context(&names, &projects),
            &mut console,
            &mut steps,
        )
        .await;

        assert_eq!(
            outcome,
            FillOutcome::Submitted {
                created: 1,
                attempted: 2,
            }
        );
        assert_eq!(client.created().len(), 1);
        assert_eq!(client.created()[0].description, "Coding");
        assert!(console.output().contains("✗ Failed 'Daily'"));
        assert!(console.output().contains("Created 1/2 entries."));
    }

    proptest! {
        #[test]
        fn start_times_are_contiguous(durations in proptest::collection::vec(1i64..20_000, 0..12)) {
            let tz: Tz = "Europe/Madrid".parse().expect("valid tz");
            let day_start = chrono::NaiveTime::from_hms_opt(9, 15, 0).expect("valid time");
            let cursor = local_instant(tz, monday(), day_start);
            let blocks: Vec<ScheduleBlock> = durations
                .iter()
                .map(|duration| ScheduleBlock::work("Task", *duration, None, true))
                .collect();

            let scheduled = assign_start_times(blocks, cursor);

            prop_assert_eq!(scheduled.len(), durations.len());
            if let Some(first) = scheduled.first() {
                prop_assert_eq!(first.start, cursor);
            }
            for pair in scheduled.windows(2) {
                prop_assert_eq!(
                    pair[1].start,
                    pair[0].start + chrono::Duration::seconds(pair[0].block.duration)
                );
            }
        }
    }
}
