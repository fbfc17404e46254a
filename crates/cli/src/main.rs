//! `order-reports` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`: generate and email one report.
//! - `run-all`: run every active report.
//! - `render`: render a report from a local records file.
//! - `check-connection`: authenticate and probe the order API.
//! - `configs`: inspect and edit report definitions.

mod configs;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use engine::{check_connectivity, ReportExecutor, RunSummary};
use mailer::{OutboxMailer, SendEmail, SmtpMailer};
use orderapi::{build_http_client, AuthProvider, QueryClient};
use render::{RenderRequest, ReportRenderer};
use reports::{aggregate, ConfigStore, ReportConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "order-reports",
    about = "Scheduled order reports: query, summarise, render to PDF and email",
    version
)]
struct Cli {
    /// Settings file (TOML). Defaults to `order-reports.toml` when present.
    #[arg(long, global = true, env = "ORDER_REPORTS_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and deliver one report.
    Run {
        report_id: String,
        /// Run date (YYYY-MM-DD); defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Keep the rendered PDF after delivery.
        #[arg(long)]
        keep_artifact: bool,
    },
    /// Run every active report. One failure does not stop the others.
    RunAll {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Render a report from a local JSON records file, without the API or email.
    Render {
        report_id: String,
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Authenticate and run a probe search against the order API.
    CheckConnection,
    /// Manage report definitions.
    Configs {
        #[command(subcommand)]
        command: ConfigsCommand,
    },
}

#[derive(Subcommand)]
enum ConfigsCommand {
    /// List every known report.
    List,
    /// Print one report definition as JSON.
    Show { report_id: String },
    /// Check a definitions file without loading it.
    Validate { path: PathBuf },
    /// Add or replace definitions from a file.
    Upsert { path: PathBuf },
    /// Mark a report inactive.
    Deactivate { report_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref()).context("failed to load settings")?;

    match cli.command {
        Command::Run {
            report_id,
            date,
            keep_artifact,
        } => {
            let store = load_store(&settings)?;
            let report = store.require(&report_id)?;
            let mut settings = settings;
            settings.keep_artifacts |= keep_artifact;
            let executor = build_executor(&settings)?;
            let summary = executor
                .run(report, date.unwrap_or_else(today))
                .await
                .with_context(|| format!("report '{report_id}' failed"))?;
            print_summary(&summary);
        }
        Command::RunAll { date } => {
            let store = load_store(&settings)?;
            let executor = build_executor(&settings)?;
            let outcomes = executor.run_all(&store, date.unwrap_or_else(today)).await;
            let mut failed = Vec::new();
            for (report_id, outcome) in outcomes {
                match outcome {
                    Ok(summary) => print_summary(&summary),
                    Err(err) => {
                        println!("{report_id}: FAILED: {err}");
                        failed.push(report_id);
                    }
                }
            }
            if !failed.is_empty() {
                bail!("{} report(s) failed: {}", failed.len(), failed.join(", "));
            }
        }
        Command::Render {
            report_id,
            records,
            out,
            date,
        } => {
            let store = load_store(&settings)?;
            let report = store.require(&report_id)?;
            render_offline(report, &records, &out, date.unwrap_or_else(today))?;
        }
        Command::CheckConnection => {
            let api = settings.api_config();
            let http = build_http_client(&api).context("failed to build HTTP client")?;
            let tokens = AuthProvider::new(http.clone(), &api);
            let orders = QueryClient::new(http, &api);
            let report = check_connectivity(&tokens, &orders).await;
            if let Some((stage, err)) = report.failure {
                bail!("{} unreachable at stage {stage}: {err}", api.base_url);
            }
            println!(
                "OK: {} (auth {:?}, probe {:?})",
                api.base_url,
                report.auth_latency.unwrap_or_default(),
                report.probe_latency.unwrap_or_default()
            );
        }
        Command::Configs { command } => run_configs(&settings, command)?,
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn load_store(settings: &Settings) -> Result<ConfigStore> {
    let (store, report) = ConfigStore::load(settings.reports_file.as_deref())
        .context("failed to load report definitions")?;
    if !report.skipped.is_empty() {
        debug!("{} report definition(s) ignored", report.skipped.len());
    }
    Ok(store)
}

fn build_executor(settings: &Settings) -> Result<ReportExecutor> {
    let api = settings.api_config();
    let http = build_http_client(&api).context("failed to build HTTP client")?;
    let tokens = Arc::new(AuthProvider::new(http.clone(), &api));
    let orders = Arc::new(QueryClient::new(http, &api));

    let mailer: Arc<dyn SendEmail> = match &settings.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("invalid SMTP settings")?),
        None => {
            info!(
                "no SMTP configured, writing messages to {}",
                settings.outbox_dir.display()
            );
            Arc::new(OutboxMailer::new(settings.outbox_dir.clone()))
        }
    };

    Ok(ReportExecutor::new(
        tokens,
        orders,
        mailer,
        settings.executor_config(),
    ))
}

fn render_offline(
    report: &ReportConfig,
    records: &std::path::Path,
    out: &std::path::Path,
    run_date: NaiveDate,
) -> Result<()> {
    let records = configs::read_records(records)?;
    let summary = aggregate(&records, &report.summary_fields)
        .with_context(|| format!("cannot summarise records for '{}'", report.report_id))?;
    let artifact = ReportRenderer::new().render(&RenderRequest {
        config: report,
        records: &records,
        summary: &summary,
        period: report.period_for(run_date),
        run_date,
    })?;
    std::fs::write(out, &artifact.bytes)
        .with_context(|| format!("cannot write {}", out.display()))?;
    println!(
        "{}: {} records rendered to {} ({} bytes)",
        report.report_id,
        records.len(),
        out.display(),
        artifact.bytes.len()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let attempts: Vec<String> = summary
        .stages
        .iter()
        .map(|s| format!("{}={}", s.stage, s.attempts))
        .collect();
    println!(
        "{}: {} records for {}, sent to {} via {} [{}]",
        summary.report_id,
        summary.record_count,
        summary.period,
        summary.recipients.join(", "),
        summary.delivered_to,
        attempts.join(" ")
    );
    if let Some(path) = &summary.artifact_path {
        println!("  kept {}", path.display());
    }
}

// ---------------------------------------------------------------------------
// configs
// ---------------------------------------------------------------------------

fn definitions_file(settings: &Settings) -> Result<&std::path::Path> {
    settings
        .reports_file
        .as_deref()
        .context("no reports_file configured (set ORDER_REPORTS_REPORTS_FILE)")
}

fn run_configs(settings: &Settings, command: ConfigsCommand) -> Result<()> {
    match command {
        ConfigsCommand::List => {
            let store = load_store(settings)?;
            for report in store.iter() {
                println!(
                    "{:<28} {:<9} {:<14} {}",
                    report.report_id,
                    if report.active { "active" } else { "inactive" },
                    report.schedule,
                    report.name
                );
            }
        }
        ConfigsCommand::Show { report_id } => {
            let store = load_store(settings)?;
            let report = store.require(&report_id)?;
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        ConfigsCommand::Validate { path } => {
            let parsed = configs::read_entries(&path)?;
            for config in &parsed.valid {
                println!("ok       {}", config.report_id);
            }
            for skipped in &parsed.skipped {
                println!(
                    "invalid  entry {} ({}): {}",
                    skipped.index,
                    skipped.report_id.as_deref().unwrap_or("?"),
                    skipped.reason
                );
            }
            if !parsed.skipped.is_empty() {
                bail!(
                    "{} of {} entries invalid",
                    parsed.skipped.len(),
                    parsed.skipped.len() + parsed.valid.len()
                );
            }
        }
        ConfigsCommand::Upsert { path } => {
            let target = definitions_file(settings)?;
            let ids = configs::upsert(&path, target)?;
            println!("saved {} to {}", ids.join(", "), target.display());
        }
        ConfigsCommand::Deactivate { report_id } => {
            let target = definitions_file(settings)?;
            let merged = if target.exists() {
                load_store(settings)?
            } else {
                ConfigStore::with_defaults()?
            };
            configs::deactivate(&report_id, &merged, target)?;
            println!("{report_id} deactivated in {}", target.display());
        }
    }
    Ok(())
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn skipped_definition_is_warned_about_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports.json");
        let entries = serde_json::json!([
            {
                "report_id": "good",
                "name": "Good",
                "schedule": "0 6 * * *",
                "email": { "recipients": ["ops@example.com"] },
                "report_fields": ["OrderId"]
            },
            { "report_id": "broken", "name": "Broken" }
        ]);
        std::fs::write(&path, entries.to_string()).unwrap();
        let settings = Settings {
            reports_file: Some(path),
            ..Settings::default()
        };

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let store = tracing::subscriber::with_default(subscriber, || load_store(&settings)).unwrap();

        assert!(store.get("good").is_some());
        assert!(store.get("broken").is_none());
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("broken").count(), 1, "{logs}");
    }
}
