use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use asset_upload_rs::cancel::CauseToken;
use asset_upload_rs::config::{OutputFormat, RunSettings};
use asset_upload_rs::dryrun::DryRunPipeline;
use asset_upload_rs::error::SupervisorError;
use asset_upload_rs::events::EventCounters;
use asset_upload_rs::render::{OutputMode, ProgressReporter};
use asset_upload_rs::supervisor::{RunReport, Supervisor};
use asset_upload_rs::{jsonout, logging};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

/// asset-upload-rs — upload a folder of photos and videos with live progress.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "asset-upload-rs",
    version,
    about = "Upload a folder of photos and videos with live progress (dry run: nothing is sent).",
    long_about = None
)]
struct Cli {
    /// Folder to upload.
    source: PathBuf,

    /// Output format for progress and the final summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Print one progress line at a time instead of updating in place. Implied when stdout is not a terminal.
    #[arg(long = "non-interactive", default_value_t = false)]
    non_interactive: bool,

    /// Log level (DEBUG|INFO|WARN|ERROR).
    #[arg(long = "log-level", default_value = "INFO")]
    log_level: String,

    /// Number of groups uploaded in parallel (1-20).
    #[arg(long = "concurrent-tasks", default_value_t = 8)]
    concurrent_tasks: usize,

    /// Progress refresh interval in milliseconds (default: 500 interactive, 5000 otherwise).
    #[arg(long = "tick-ms", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = RunSettings::resolve(
        cli.output,
        cli.non_interactive,
        std::io::stdout().is_terminal(),
        &cli.log_level,
        cli.concurrent_tasks,
        cli.tick_ms,
    )?;
    logging::init(settings.log_level, settings.mode == OutputMode::Json)?;
    info!(
        source = %cli.source.display(),
        mode = ?settings.mode,
        concurrent_tasks = settings.concurrent_tasks,
        "starting upload"
    );

    let events = Arc::new(EventCounters::new());
    let pipeline = Arc::new(DryRunPipeline::new(
        &cli.source,
        events.clone(),
        settings.concurrent_tasks,
    ));
    let supervisor = Supervisor::new(pipeline, events, ProgressReporter::new(settings.mode))
        .with_tick(settings.tick);

    let cancel = CauseToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel_with(SupervisorError::Interrupted);
        }
    });

    let report = supervisor.run(cancel).await;
    print_report(&report, settings.mode);
    let code = report.exit_code();
    if let Err(e) = report.into_result() {
        error!("{e:#}");
    }
    Ok(ExitCode::from(code as u8))
}

fn print_report(report: &RunReport, mode: OutputMode) {
    if mode == OutputMode::Json {
        if let Err(e) = jsonout::write_summary(&report.summary()) {
            error!(error = %e, "failed to write JSON summary");
        }
        return;
    }
    let counters = report.events.asset_counters();
    info!(
        processed = counters.processed,
        discarded = counters.discarded,
        errors = counters.errors,
        pending = counters.pending,
        duration_secs = report.duration.as_secs_f64(),
        "upload summary"
    );
    for (name, tally) in report.events.by_name() {
        info!(event = %name, count = tally.count, size = tally.size);
    }
}
