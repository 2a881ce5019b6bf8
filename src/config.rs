use crate::render::OutputMode;
use crate::supervisor::default_tick;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// `--output` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub const MIN_CONCURRENT_TASKS: usize = 1;
pub const MAX_CONCURRENT_TASKS: usize = 20;

/// Settings resolved once at startup and fixed for the run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub mode: OutputMode,
    pub tick: Duration,
    pub log_level: Level,
    pub concurrent_tasks: usize,
}

impl RunSettings {
    pub fn resolve(
        format: OutputFormat,
        non_interactive: bool,
        stdout_is_tty: bool,
        log_level: &str,
        concurrent_tasks: usize,
        tick_ms: Option<u64>,
    ) -> Result<Self> {
        if tick_ms == Some(0) {
            bail!("progress interval must be at least 1 ms");
        }
        let mode = OutputMode::detect(format, non_interactive, stdout_is_tty);
        Ok(Self {
            mode,
            tick: tick_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| default_tick(mode)),
            log_level: parse_level(log_level)?,
            concurrent_tasks: concurrent_tasks.clamp(MIN_CONCURRENT_TASKS, MAX_CONCURRENT_TASKS),
        })
    }
}

impl OutputMode {
    pub fn detect(format: OutputFormat, non_interactive: bool, stdout_is_tty: bool) -> Self {
        match format {
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Text if non_interactive || !stdout_is_tty => OutputMode::Text,
            OutputFormat::Text => OutputMode::Interactive,
        }
    }
}

/// Accepts `DEBUG|INFO|WARN|ERROR` in any case.
pub fn parse_level(s: &str) -> Result<Level> {
    match Level::from_str(s.trim()) {
        Ok(l) if l != Level::TRACE => Ok(l),
        _ => bail!("invalid log level: {s:?} (expected DEBUG, INFO, WARN or ERROR)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_wins_over_tty() {
        assert_eq!(OutputMode::detect(OutputFormat::Json, false, true), OutputMode::Json);
        assert_eq!(OutputMode::detect(OutputFormat::Json, true, false), OutputMode::Json);
    }

    #[test]
    fn text_without_tty_is_non_interactive() {
        assert_eq!(OutputMode::detect(OutputFormat::Text, false, false), OutputMode::Text);
        assert_eq!(OutputMode::detect(OutputFormat::Text, true, true), OutputMode::Text);
        assert_eq!(
            OutputMode::detect(OutputFormat::Text, false, true),
            OutputMode::Interactive
        );
    }

    #[test]
    fn resolve_clamps_and_picks_tick() {
        let s = RunSettings::resolve(OutputFormat::Text, false, true, "info", 0, None).unwrap();
        assert_eq!(s.concurrent_tasks, 1);
        assert_eq!(s.tick, Duration::from_millis(500));

        let s = RunSettings::resolve(OutputFormat::Text, true, true, "warn", 99, Some(50)).unwrap();
        assert_eq!(s.concurrent_tasks, 20);
        assert_eq!(s.tick, Duration::from_millis(50));
        assert_eq!(s.log_level, Level::WARN);
    }

    #[test]
    fn zero_tick_rejected() {
        let err = RunSettings::resolve(OutputFormat::Json, false, false, "info", 4, Some(0)).unwrap_err();
        assert!(err.to_string().contains("at least 1 ms"));
        assert!(RunSettings::resolve(OutputFormat::Json, false, false, "info", 4, Some(1)).is_ok());
    }

    #[test]
    fn bad_level_rejected() {
        assert!(parse_level("loud").is_err());
        assert!(parse_level("trace").is_err());
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
    }
}
