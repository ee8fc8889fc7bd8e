mod api_client;
mod auth;
mod config;
mod data;
mod drive;
mod error;
mod notify;
mod report;
mod runner;
mod store;
mod summary;
mod watermark;

use api_client::ApiClient;
use auth::{CachedTokenProvider, IronSourceAuth};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{Config, DriveConfig, GoogleConfig, SlackConfig, SourceConfig};
use drive::{duplicate_message, DriveClient};
use error::Error;
use log::{error, info};
use notify::{notify_best_effort, SlackNotifier};
use report::{FailurePolicy, Report, WritePolicy, FILL_RATE, REVENUE};
use reqwest::Client;
use runner::{RunSummary, SyncSettings};
use std::time::Duration;
use store::SheetsStore;
use summary::{failure_line, SummaryLog};

#[derive(Parser)]
#[command(about = "Syncs mediation reporting metrics into shared spreadsheets")]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Appends daily revenue for every day after the sheet's watermark through yesterday.
    Daily {
        #[command(flatten)]
        source: SourceConfig,

        #[command(flatten)]
        google: GoogleConfig,

        #[arg(long, env = "GOOGLE_SHEET_DAILY_ID")]
        sheet_id: String,

        #[arg(long, env = "FAILURE_POLICY", value_enum)]
        failure_policy: Option<FailurePolicy>,

        #[arg(long, help = "Date should be in the form YYYY-MM-DD", value_parser = validate_date)]
        today: Option<NaiveDate>,
    },
    /// Rewrites the placement fill rate tab with a single day's snapshot.
    FillRate {
        #[command(flatten)]
        source: SourceConfig,

        #[command(flatten)]
        google: GoogleConfig,

        #[arg(long, env = "GOOGLE_SHEET_ID")]
        sheet_id: String,

        #[arg(long, env = "FAILURE_POLICY", value_enum)]
        failure_policy: Option<FailurePolicy>,

        /// Day to refill, yesterday when omitted.
        #[arg(long, help = "Date should be in the form YYYY-MM-DD", value_parser = validate_date)]
        day: Option<NaiveDate>,
    },
    /// Posts the accumulated run summary to Slack.
    Notify {
        #[command(flatten)]
        slack: SlackConfig,

        /// Empty the summary file after a successful post.
        #[arg(long)]
        truncate: bool,
    },
    /// Copies the blank waterfall template, shares it and posts the link to Slack.
    Duplicate {
        #[command(flatten)]
        google: GoogleConfig,

        #[command(flatten)]
        drive: DriveConfig,

        #[command(flatten)]
        slack: SlackConfig,
    },
}

fn validate_date(s: &str) -> Result<NaiveDate, String> {
    let error_message = "Invalid date, expected YYYY-MM-DD";

    let parts = s
        .split("-")
        .map(|part| part.parse::<u16>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| error_message)?;

    match parts.as_slice() {
        &[year, month, day] if month <= 12 && day <= 31 => {
            Ok(
                NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                    .ok_or(error_message)?,
            )
        }
        _ => Err(error_message.to_string()),
    }
}

/// One report run against one spreadsheet.
struct SyncJob<'a> {
    report: &'a Report,
    source: &'a SourceConfig,
    google: &'a GoogleConfig,
    sheet_id: &'a str,
    failure_policy: Option<FailurePolicy>,
}

/// Runs `job` and records the outcome in the summary file. `date` is today for append
/// reports and the day to refill for overwrite reports.
async fn run_sync_job(
    client: &Client,
    summary: &SummaryLog,
    job: SyncJob<'_>,
    date: NaiveDate,
) -> Result<RunSummary, Error> {
    let SyncJob {
        report,
        source,
        google,
        sheet_id,
        failure_policy,
    } = job;

    let tokens = CachedTokenProvider::new(
        IronSourceAuth::new(client.clone(), source),
        Duration::from_secs(source.token_ttl_secs),
    );
    let api = ApiClient::new(client.clone(), source, tokens);
    let store = SheetsStore::new(client.clone(), google, sheet_id);
    let settings = SyncSettings::new(source, failure_policy, store.sheet_url());

    let result = match report.write_policy {
        WritePolicy::Append => {
            runner::sync_incremental(&api, &store, report, &settings, date).await
        }
        WritePolicy::Overwrite => runner::refill(&api, &store, report, &settings, date).await,
    };

    let line = match &result {
        Ok(run) => {
            info!("{}: {}", report.name, run);
            run.summary_line().map(str::to_string)
        }
        Err(err) => {
            error!("Error in {}: {}", report.name, err);
            Some(failure_line(report.name, err))
        }
    };

    if let Some(line) = line {
        if let Err(err) = summary.append(&line) {
            error!("Failed to record run summary: {}", err);
        }
    }

    result
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::init();

    let summary = SummaryLog::new(&args.config.summary_file_path);
    let client = Client::new();
    let today = Local::now().date_naive();

    match args.command {
        Command::Daily {
            source,
            google,
            sheet_id,
            failure_policy,
            today: today_override,
        } => {
            let job = SyncJob {
                report: &REVENUE,
                source: &source,
                google: &google,
                sheet_id: &sheet_id,
                failure_policy,
            };
            let result =
                run_sync_job(&client, &summary, job, today_override.unwrap_or(today)).await;
            if result.is_err() {
                std::process::exit(1);
            }
        }
        Command::FillRate {
            source,
            google,
            sheet_id,
            failure_policy,
            day,
        } => {
            let job = SyncJob {
                report: &FILL_RATE,
                source: &source,
                google: &google,
                sheet_id: &sheet_id,
                failure_policy,
            };
            let day = day.unwrap_or(today - Days::new(1));
            let result = run_sync_job(&client, &summary, job, day).await;
            if result.is_err() {
                std::process::exit(1);
            }
        }
        Command::Notify { slack, truncate } => {
            let message = summary.read()?;
            let notifier = SlackNotifier::new(client, &slack);
            if notify_best_effort(&notifier, &message).await && truncate {
                summary.truncate()?;
            }
        }
        Command::Duplicate {
            google,
            drive,
            slack,
        } => {
            let result = DriveClient::new(client.clone(), &google)
                .duplicate_template(&drive, today)
                .await;
            if let Err(err) = &result {
                error!("Error in duplicate: {}", err);
            }

            let notifier = SlackNotifier::new(client, &slack);
            notify_best_effort(&notifier, &duplicate_message(&result, today)).await;

            if result.is_err() {
                std::process::exit(1);
            }
        }
    };

    Ok(())
}
