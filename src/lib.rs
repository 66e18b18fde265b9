mod application;
mod domain;
mod infrastructure;
#[cfg(test)]
mod test_support;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    check_today, day_off, fill_date, log_task_hours, monthly_report, run_menu, view_projects,
};
use application::console::{Console, StdConsole};
use application::month_fill::run_month_fill;
use application::session::Session;
use clap::{Parser, Subcommand};
use domain::breaks::RandomSteps;
use infrastructure::config::load_settings;
use infrastructure::credential_store::{CredentialStore, KeyringCredentialStore, resolve_token};
use infrastructure::error::InfraError;
use infrastructure::session_cache::{SessionCache, SqliteSessionCache};
use infrastructure::toggl_client::ReqwestTogglClient;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "toggl-autofill",
    version,
    about = "Fills incomplete workdays in Toggl Track from recent activity"
)]
struct Cli {
    /// Directory holding config.json and state/ (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Interactive menu (default)
    Menu,
    /// Fill incomplete working days of the current month
    FillMonth,
    /// Fill one date
    FillDate {
        #[arg(long)]
        date: Option<String>,
    },
    /// Log explicit hours for recent tasks
    LogTasks {
        #[arg(long)]
        date: Option<String>,
    },
    /// Show today's entries
    Today,
    /// List workspace projects
    Projects,
    /// Log a non-billable day off
    DayOff {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        hours: Option<String>,
    },
    /// Per-day totals for a month
    Report {
        /// YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Save the API token in the system credential store
    StoreToken {
        #[arg(long)]
        token: Option<String>,
        /// Remove the stored token instead
        #[arg(long, conflicts_with = "token")]
        clear: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,toggl_autofill=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn store_token(
    store: &dyn CredentialStore,
    console: &mut dyn Console,
    preset: Option<&str>,
    clear: bool,
) -> Result<(), InfraError> {
    if clear {
        store.delete_token()?;
        console.say("  Stored token removed.");
        return Ok(());
    }
    let token = match preset {
        Some(token) => token.trim().to_string(),
        None => console.ask("  Toggl API token: "),
    };
    if token.is_empty() {
        return Err(InfraError::Validation("api token must not be empty".to_string()));
    }
    store.save_token(&token)?;
    console.say("  Token saved to the system credential store.");
    Ok(())
}

async fn execute(cli: Cli) -> Result<(), InfraError> {
    let workspace_root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let paths = bootstrap_workspace(&workspace_root)?;
    info!(
        root = %paths.workspace_root.display(),
        config = %paths.config_path.display(),
        database = %paths.database_path.display(),
        "workspace ready"
    );

    let store = KeyringCredentialStore::default();
    let mut console = StdConsole::default();
    let command = cli.command.unwrap_or(Command::Menu);
    if let Command::StoreToken { token, clear } = &command {
        return store_token(&store, &mut console, token.as_deref(), *clear);
    }

    let mut settings = load_settings(&paths.workspace_root)?;
    match resolve_token(&settings.api_token, &store) {
        Ok(Some(token)) => settings.api_token = token,
        Ok(None) => {}
        Err(error) => warn!(%error, "credential store unavailable"),
    }
    settings.require_token()?;

    let client = Arc::new(ReqwestTogglClient::new(settings.api_token.clone()));
    let cache: Arc<dyn SessionCache> = Arc::new(SqliteSessionCache::new(&paths.database_path));
    let session = Session::new(client, settings, cache);
    let mut steps = RandomSteps::new(StdRng::from_entropy());

    match command {
        Command::Menu => {
            run_menu(&session, &mut console, &mut steps).await;
            Ok(())
        }
        Command::FillMonth => run_month_fill(&session, &mut console, &mut steps)
            .await
            .map(|_| ()),
        Command::FillDate { date } => {
            fill_date(&session, &mut console, &mut steps, date.as_deref()).await
        }
        Command::LogTasks { date } => log_task_hours(&session, &mut console, date.as_deref()).await,
        Command::Today => check_today(&session, &mut console).await,
        Command::Projects => view_projects(&session, &mut console).await,
        Command::DayOff { date, hours } => {
            day_off(&session, &mut console, date.as_deref(), hours.as_deref()).await
        }
        Command::Report { month } => monthly_report(&session, &mut console, month.as_deref()).await,
        Command::StoreToken { .. } => Ok(()),
    }
}

/// Parses the command line, runs the requested action and maps the outcome to an exit code.
pub async fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "toggl-autofill failed");
            eprintln!("\n  ⚠ {error}");
            ExitCode::FAILURE
        }
    }
}
