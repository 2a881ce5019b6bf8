use crate::events::EventCounters;
use crate::jsonout;
use crate::progress::ScanProgress;
use crate::types::ProgressUpdate;
use std::io::{self, Write};
use tracing::warn;

/// How progress is presented for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Single line rewritten in place on stdout, with a spinner.
    Interactive,
    /// One standalone line per update on stderr.
    Text,
    /// One JSON record per update on stdout.
    Json,
}

/// Values shown in one progress update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub remote_read_pct: u32,
    pub assets_found: u64,
    pub upload_errors: u64,
    pub uploaded: u64,
}

impl Snapshot {
    pub fn capture(progress: &ScanProgress, events: &EventCounters) -> Self {
        let counts = events.snapshot();
        Self {
            remote_read_pct: progress.percent(),
            assets_found: counts.assets_found(),
            upload_errors: counts.upload_errors(),
            uploaded: counts.uploaded(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Terminal(String),
    Log(String),
    Json(ProgressUpdate),
}

const SPINNER: [char; 5] = ['.', 'o', 'O', 'o', ' '];

pub struct ProgressRenderer {
    mode: OutputMode,
    spin_idx: usize,
}

impl ProgressRenderer {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode, spin_idx: 0 }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Turn `snap` into output for the active mode. `last` marks the final render of a run.
    pub fn render(&mut self, snap: &Snapshot, last: bool) -> Rendered {
        match self.mode {
            OutputMode::Interactive => {
                let glyph = SPINNER[self.spin_idx];
                self.spin_idx = (self.spin_idx + 1) % SPINNER.len();
                let mut line = format!("\r{} {}", sentence(snap), glyph);
                if last {
                    line.push('\n');
                }
                Rendered::Terminal(line)
            }
            OutputMode::Text => Rendered::Log(sentence(snap)),
            OutputMode::Json => Rendered::Json(jsonout::progress_record(
                snap.remote_read_pct,
                snap.assets_found,
                snap.upload_errors,
                snap.uploaded,
            )),
        }
    }
}

fn sentence(snap: &Snapshot) -> String {
    format!(
        "Remote read {}%, Assets found: {}, Upload errors: {}, Uploaded {}",
        snap.remote_read_pct, snap.assets_found, snap.upload_errors, snap.uploaded
    )
}

/// Writes rendered progress to stdout/stderr. Write failures are logged once and otherwise ignored.
pub struct ProgressReporter {
    renderer: ProgressRenderer,
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    write_failed: bool,
}

impl ProgressReporter {
    pub fn new(mode: OutputMode) -> Self {
        Self::with_writers(mode, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(
        mode: OutputMode,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            renderer: ProgressRenderer::new(mode),
            out,
            err,
            write_failed: false,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.renderer.mode()
    }

    pub fn emit(&mut self, snap: &Snapshot, last: bool) {
        let res = match self.renderer.render(snap, last) {
            Rendered::Terminal(line) => self
                .out
                .write_all(line.as_bytes())
                .and_then(|_| self.out.flush())
                .map_err(anyhow::Error::from),
            Rendered::Log(line) => {
                writeln!(self.err, "{line}").map_err(anyhow::Error::from)
            }
            Rendered::Json(record) => jsonout::write_line(&mut self.out, &record),
        };
        if let Err(e) = res {
            if !self.write_failed {
                self.write_failed = true;
                warn!(error = %e, "failed to write progress");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap() -> Snapshot {
        Snapshot {
            remote_read_pct: 25,
            assets_found: 10,
            upload_errors: 1,
            uploaded: 4,
        }
    }

    #[test]
    fn interactive_rotates_spinner() {
        let mut r = ProgressRenderer::new(OutputMode::Interactive);
        let frames: Vec<String> = (0..6)
            .map(|_| match r.render(&snap(), false) {
                Rendered::Terminal(s) => s,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(frames.iter().all(|f| f.starts_with('\r')));
        assert!(frames[0].ends_with(SPINNER[0]));
        assert!(frames[1].ends_with(SPINNER[1]));
        // wraps after five frames
        assert_eq!(frames[0], frames[5]);
    }

    #[test]
    fn interactive_final_line_ends_with_newline() {
        let mut r = ProgressRenderer::new(OutputMode::Interactive);
        match r.render(&snap(), true) {
            Rendered::Terminal(s) => assert!(s.ends_with('\n')),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn text_line_has_no_carriage_return() {
        let mut r = ProgressRenderer::new(OutputMode::Text);
        match r.render(&snap(), true) {
            Rendered::Log(s) => {
                assert!(!s.contains('\r'));
                assert_eq!(
                    s,
                    "Remote read 25%, Assets found: 10, Upload errors: 1, Uploaded 4"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn json_record_is_tagged() {
        let mut r = ProgressRenderer::new(OutputMode::Json);
        match r.render(&snap(), false) {
            Rendered::Json(p) => {
                assert_eq!(p.kind, "progress");
                assert_eq!(p.remote_read_pct, 25);
                assert_eq!(p.uploaded, 4);
                assert!(!p.timestamp.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
