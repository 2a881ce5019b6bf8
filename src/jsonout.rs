use crate::types::{AssetCounters, EventSummary, FinalSummary, ProgressUpdate, RunStatus};
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

pub fn progress_record(
    remote_read_pct: u32,
    assets_found: u64,
    upload_errors: u64,
    uploaded: u64,
) -> ProgressUpdate {
    ProgressUpdate {
        kind: "progress".into(),
        timestamp: now_rfc3339(),
        remote_read_pct,
        assets_found,
        upload_errors,
        uploaded,
    }
}

pub fn summary_record(
    status: RunStatus,
    exit_code: i32,
    counters: AssetCounters,
    events: BTreeMap<String, EventSummary>,
    duration_seconds: f64,
) -> FinalSummary {
    FinalSummary {
        kind: "summary".into(),
        status,
        exit_code,
        counters,
        events,
        duration_seconds,
        timestamp: now_rfc3339(),
    }
}

/// Serialize `record` as one newline-terminated line and hand it to `out` in a single write.
pub fn write_line<W: Write + ?Sized, T: Serialize>(out: &mut W, record: &T) -> Result<()> {
    let mut buf = serde_json::to_vec(record).context("failed to marshal JSON")?;
    buf.push(b'\n');
    out.write_all(&buf)?;
    out.flush()?;
    Ok(())
}

pub fn write_summary(summary: &FinalSummary) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_line(&mut lock, summary)
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
