//! Timesheet User Bot - Main Entry Point
//!
//! Sends today's timesheet entries and the end-of-day clock-out to a
//! Telegram bot, skipping public holidays. Meant to be run from cron.

use std::future::Future;
use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use timesheet_user_bot::config::{AppConfig, GoogleConfig, SheetConfig, TelegramConfig};
use timesheet_user_bot::google::{
    self, CalendarHolidays, ServiceAccountAuth, ServiceAccountKey, SheetsClient, CALENDAR_SCOPES,
    SHEETS_SCOPES,
};
use timesheet_user_bot::holiday::{HolidayLookup, HolidayOracle};
use timesheet_user_bot::jobs::{Application, Job, JobOutcome};
use timesheet_user_bot::telegram::{login, ChatDispatcher, TelegramBot, TelegramConnector};
use timesheet_user_bot::timesheet::Timesheet;

/// Telegram userbot that reports your daily timesheet.
#[derive(Parser, Debug)]
#[command(name = "timesheet_bot")]
#[command(about = "Send today's timesheet and clock-out commands to a Telegram bot")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env", global = true)]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one `/ts` entry per timesheet row dated today.
    SubmitTimesheet,

    /// Send `/clock_out`.
    ClockOut,

    /// Sign the chat session in interactively.
    Login,

    /// Print whether a date is a public holiday.
    CheckHoliday {
        /// Date to check (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    match args.command {
        Command::SubmitTimesheet => submit_timesheet().await,
        Command::ClockOut => clock_out().await,
        Command::Login => sign_in().await,
        Command::CheckHoliday { date } => check_holiday(date).await,
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn submit_timesheet() -> Result<()> {
    let config =
        AppConfig::from_env().context("Failed to load configuration from environment")?;
    let sheet_config =
        SheetConfig::from_env().context("Failed to load timesheet configuration")?;

    let google = GoogleServices::load(&config.google)?;
    let app = build_application(&config, &google)?;
    let source = SheetsClient::new(google.http.clone(), google.auth(SHEETS_SCOPES)?, &sheet_config);
    let timesheet = Timesheet::new(Box::new(source), &sheet_config);

    let today = Local::now().date_naive();
    run_until_shutdown(
        Job::SubmitTimesheet,
        app.submit_timesheet(&timesheet, today),
    )
    .await;
    Ok(())
}

async fn clock_out() -> Result<()> {
    let config =
        AppConfig::from_env().context("Failed to load configuration from environment")?;

    let google = GoogleServices::load(&config.google)?;
    let app = build_application(&config, &google)?;

    let today = Local::now().date_naive();
    run_until_shutdown(Job::ClockOut, app.clock_out(today)).await;
    Ok(())
}

/// Signs the session in, prompting on the terminal if needed.
async fn sign_in() -> Result<()> {
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    if bot.is_authorized().await.context("Failed to check authorization")? {
        info!("Session '{}' is already authorized", tg_config.session_name);
    } else {
        login::authenticate(&bot, &tg_config)
            .await
            .context("Authentication failed")?;
        info!("Session saved to {}", tg_config.session_path.display());
    }

    bot.disconnect();
    Ok(())
}

/// Prints the holiday calendar's answer for `date` (today by default).
async fn check_holiday(date: Option<NaiveDate>) -> Result<()> {
    let config = GoogleConfig::from_env().context("Failed to load Google configuration")?;
    let google = GoogleServices::load(&config)?;
    let holidays = CalendarHolidays::new(
        google.http.clone(),
        google.auth(CALENDAR_SCOPES)?,
        config.holiday_calendar_id.clone(),
    );

    let date = date.unwrap_or_else(|| Local::now().date_naive());
    match holidays.lookup(date).await {
        HolidayLookup::Holiday { name } => println!("{date}: holiday ({name})"),
        HolidayLookup::WorkingDay => println!("{date}: working day"),
        HolidayLookup::LookupFailed(failure) => println!("{date}: lookup failed ({failure})"),
    }

    Ok(())
}

/// HTTP client and service-account key shared by the Google readers.
struct GoogleServices {
    http: reqwest::Client,
    key: ServiceAccountKey,
}

impl GoogleServices {
    fn load(config: &GoogleConfig) -> Result<Self> {
        let key = ServiceAccountKey::load(&config.credentials_path).with_context(|| {
            format!(
                "Failed to read service-account key {}",
                config.credentials_path.display()
            )
        })?;
        let http = google::http_client().context("Failed to build HTTP client")?;
        Ok(Self { http, key })
    }

    fn auth(&self, scopes: &[&str]) -> Result<Arc<ServiceAccountAuth>> {
        let auth = ServiceAccountAuth::new(self.http.clone(), self.key.clone(), scopes)
            .context("Invalid service-account private key")?;
        Ok(Arc::new(auth))
    }
}

fn build_application(config: &AppConfig, google: &GoogleServices) -> Result<Application> {
    let holidays = CalendarHolidays::new(
        google.http.clone(),
        google.auth(CALENDAR_SCOPES)?,
        config.google.holiday_calendar_id.clone(),
    );

    let interactive = std::io::stdin().is_terminal();
    let connector = TelegramConnector::new(config.telegram.clone(), interactive);
    let dispatcher = ChatDispatcher::new(Box::new(connector), config.bot.target_recipient.clone());

    Ok(Application::new(Box::new(holidays), dispatcher))
}

/// Runs a job until it finishes or the process is asked to stop.
///
/// Stopping drops the job future, which disconnects any open session.
async fn run_until_shutdown(job: Job, run: impl Future<Output = JobOutcome>) {
    info!("Starting {}...", job);

    tokio::select! {
        outcome = run => info!("Finished {}: {}", job, outcome),
        () = shutdown_signal() => warn!("{} interrupted before finishing", job),
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
