use crate::cancel::CauseToken;
use crate::error::SupervisorError;
use crate::events::{EventCounters, EventSnapshot};
use crate::jsonout;
use crate::phases::{run_phases, UploadPipeline};
use crate::progress::ScanProgress;
use crate::render::{OutputMode, ProgressReporter, Snapshot};
use crate::types::{FinalSummary, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default reporting interval for a mode.
pub fn default_tick(mode: OutputMode) -> Duration {
    match mode {
        OutputMode::Interactive => Duration::from_millis(500),
        OutputMode::Text | OutputMode::Json => Duration::from_secs(5),
    }
}

const MIN_TICK: Duration = Duration::from_millis(1);

/// Runs one upload: discovery phases, upload loop, finishing step, and live progress.
pub struct Supervisor<P: UploadPipeline> {
    pipeline: Arc<P>,
    events: Arc<EventCounters>,
    progress: ScanProgress,
    reporter: ProgressReporter,
    tick: Duration,
}

impl<P: UploadPipeline> Supervisor<P> {
    pub fn new(pipeline: Arc<P>, events: Arc<EventCounters>, reporter: ProgressReporter) -> Self {
        let tick = default_tick(reporter.mode());
        Self {
            pipeline,
            events,
            progress: ScanProgress::new(),
            reporter,
            tick,
        }
    }

    /// Reporting interval, at least 1 ms.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(MIN_TICK);
        self
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress.clone()
    }

    /// Run to completion. `cancel` is the root token; its first cause becomes the report's cause.
    pub async fn run(self, cancel: CauseToken) -> RunReport {
        let started = Instant::now();
        let stop = CancellationToken::new();

        let reporter = tokio::spawn(report_progress(
            self.reporter,
            self.progress.clone(),
            self.events.clone(),
            self.tick,
            cancel.clone(),
            stop.clone(),
        ));
        let pipeline = tokio::spawn(drive_pipeline(
            self.pipeline,
            self.progress.clone(),
            self.events.clone(),
            cancel.clone(),
            stop,
        ));

        let suppressed = match pipeline.await {
            Ok(errors) => errors,
            Err(_) => {
                cancel.cancel_with(SupervisorError::TaskPanicked { task: "pipeline" });
                Vec::new()
            }
        };
        if reporter.await.is_err() {
            cancel.cancel_with(SupervisorError::TaskPanicked { task: "progress" });
        }

        let report = RunReport::new(cancel.cause(), self.events.snapshot(), started.elapsed())
            .with_suppressed(suppressed);
        info!(outcome = ?report.outcome, elapsed = ?report.duration, "upload run finished");
        report
    }
}

async fn report_progress(
    mut reporter: ProgressReporter,
    progress: ScanProgress,
    events: Arc<EventCounters>,
    tick: Duration,
    cancel: CauseToken,
    stop: CancellationToken,
) {
    let tick = tick.max(MIN_TICK);
    let mut ticker = time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => reporter.emit(&Snapshot::capture(&progress, &events), false),
        }
    }
    reporter.emit(&Snapshot::capture(&progress, &events), true);
}

/// Returns the upload/finishing errors that arrived after the cause was already set.
async fn drive_pipeline<P: UploadPipeline>(
    pipeline: Arc<P>,
    progress: ScanProgress,
    events: Arc<EventCounters>,
    cancel: CauseToken,
    stop: CancellationToken,
) -> Vec<anyhow::Error> {
    let Some(groups) = run_phases(pipeline.as_ref(), progress.callback(), &cancel).await else {
        debug!("discovery did not complete, upload not started");
        return Vec::new();
    };

    let mut suppressed = Vec::new();
    if let Err(e) = pipeline.upload_loop(cancel.clone(), groups).await {
        suppressed.extend(cancel.cancel_or_return(e));
    }
    if let Err(e) = pipeline.finishing(cancel.clone()).await {
        suppressed.extend(cancel.cancel_or_return(e));
    }

    let errors = events.snapshot().errors();
    if errors > 0 {
        cancel.cancel_with(SupervisorError::UploadErrors { errors });
    }
    stop.cancel();
    suppressed
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The upload loop finished but some files failed.
    CompletedWithErrors,
    Aborted,
}

/// Final state of a run, built once after every task has returned.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub cause: Option<Arc<anyhow::Error>>,
    /// Errors from the upload loop or finishing step that came after `cause`.
    pub suppressed: Vec<Arc<anyhow::Error>>,
    pub events: EventSnapshot,
    pub duration: Duration,
}

impl RunReport {
    pub fn new(cause: Option<Arc<anyhow::Error>>, events: EventSnapshot, duration: Duration) -> Self {
        let outcome = match cause.as_deref() {
            None if events.errors() > 0 => Outcome::CompletedWithErrors,
            None => Outcome::Success,
            Some(e) => match e.downcast_ref::<SupervisorError>() {
                Some(SupervisorError::UploadErrors { .. }) => Outcome::CompletedWithErrors,
                _ => Outcome::Aborted,
            },
        };
        Self {
            outcome,
            cause,
            suppressed: Vec::new(),
            events,
            duration,
        }
    }

    pub fn with_suppressed(mut self, errors: Vec<anyhow::Error>) -> Self {
        self.suppressed = errors.into_iter().map(Arc::new).collect();
        self
    }

    pub fn status(&self) -> RunStatus {
        match self.outcome {
            Outcome::Success => RunStatus::Success,
            Outcome::CompletedWithErrors | Outcome::Aborted => RunStatus::Error,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status() {
            RunStatus::Success => 0,
            RunStatus::Error => 1,
        }
    }

    pub fn summary(&self) -> FinalSummary {
        jsonout::summary_record(
            self.status(),
            self.exit_code(),
            self.events.asset_counters(),
            self.events.by_name(),
            self.duration.as_secs_f64(),
        )
    }

    /// The cause (with its context chain) followed by any suppressed errors.
    pub fn into_result(self) -> anyhow::Result<()> {
        let Some(cause) = self.cause else {
            return Ok(());
        };
        let first = anyhow::anyhow!("{cause:#}");
        if self.suppressed.is_empty() {
            return Err(first);
        }
        let mut all = vec![first];
        all.extend(self.suppressed.iter().map(|e| anyhow::anyhow!("{e:#}")));
        Err(SupervisorError::Joined(all).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn into_result_keeps_context_chain() {
        let cause: anyhow::Result<()> = Err(anyhow!("No such file or directory"));
        let cause = cause.context("cannot read source: /photos").unwrap_err();
        let report = RunReport::new(Some(Arc::new(cause)), EventSnapshot::default(), Duration::ZERO);

        let msg = report.into_result().unwrap_err().to_string();
        assert_eq!(msg, "cannot read source: /photos: No such file or directory");
    }

    #[test]
    fn into_result_lists_suppressed_errors_after_cause() {
        let report = RunReport::new(
            Some(Arc::new(anyhow!("transport closed"))),
            EventSnapshot::default(),
            Duration::ZERO,
        )
        .with_suppressed(vec![anyhow!("album flush failed")]);

        let msg = report.into_result().unwrap_err().to_string();
        assert_eq!(msg, "transport closed\nalbum flush failed");
    }

    #[test]
    fn clean_report_is_ok() {
        let report = RunReport::new(None, EventSnapshot::default(), Duration::ZERO);
        assert_eq!(report.outcome, Outcome::Success);
        assert!(report.into_result().is_ok());
    }
}
