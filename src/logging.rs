//! Device log sink.
//!
//! Every event becomes one line in an append-only file:
//!
//! ```text
//! [10-16-2026 08:15:02]   Fetch successful.
//! ```
//!
//! The file is opened in append mode for each line and never truncated, so it can
//! be rotated or inspected while the device runs. [`AppendLog`] is created once at
//! startup and handed to the `tracing` subscriber by [`init`].

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Timestamp layout of a log line.
const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// Gap between the timestamp and the message.
const SEPARATOR: &str = "   ";

/// Formats `message` the way it appears in the log file, stamped with local time.
#[must_use]
pub fn stamp(message: &str) -> String {
    format!(
        "[{}]{SEPARATOR}{message}",
        chrono::Local::now().format(TIMESTAMP_FORMAT)
    )
}

/// Append-only log file, reopened for every line.
#[derive(Debug, Clone)]
pub struct AppendLog {
    path: PathBuf,
}

impl AppendLog {
    /// Creates the sink, checking that `path` can be opened for appending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogSink`] if the file cannot be created or opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        open_append(&path).map_err(|source| Error::LogSink {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl<'a> MakeWriter<'a> for AppendLog {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            path: self.path.clone(),
            line: Vec::new(),
        }
    }
}

/// Buffers one formatted event and appends it to the file when dropped.
#[derive(Debug)]
pub struct LineWriter {
    path: PathBuf,
    line: Vec<u8>,
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.line.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        if self.line.is_empty() {
            return;
        }
        // Nowhere left to report a failing log file but stderr.
        if let Err(e) = open_append(&self.path).and_then(|mut f| f.write_all(&self.line)) {
            eprintln!("failed to append to {}: {e}", self.path.display());
        }
    }
}

/// Event format of the log file: `[MM-DD-YYYY HH:MM:SS]   <message> <fields>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceLogFormat;

impl<S, N> FormatEvent<S, N> for DeviceLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "[{}]{SEPARATOR}",
            chrono::Local::now().format(TIMESTAMP_FORMAT)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber: console output plus the device log file.
///
/// The level is taken from `RUST_LOG`, defaulting to `companion_cube=info`.
pub fn init(log: AppendLog) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("companion_cube=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(DeviceLogFormat)
                .with_ansi(false)
                .with_writer(log),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn line_pattern(message: &str) -> Regex {
        Regex::new(&format!(
            r"^\[\d{{2}}-\d{{2}}-\d{{4}} \d{{2}}:\d{{2}}:\d{{2}}\]   {message}$"
        ))
        .unwrap()
    }

    #[test]
    fn test_stamp_format() {
        let line = stamp("No Internet connection.");
        assert!(line_pattern(r"No Internet connection\.").is_match(&line));
    }

    #[test]
    fn test_open_rejects_unwritable_path() {
        let err = AppendLog::open("/definitely/not/a/dir/app.log").unwrap_err();
        assert!(matches!(err, Error::LogSink { .. }));
    }

    #[test]
    fn test_events_are_appended_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "earlier line\n").unwrap();

        let log = AppendLog::open(&path).unwrap();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .event_format(DeviceLogFormat)
                .with_ansi(false)
                .with_writer(log),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Loaded config.");
            tracing::warn!("Sleeping before cycling.");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier line");
        assert!(line_pattern(r"Loaded config\.").is_match(lines[1]));
        assert!(line_pattern(r"Sleeping before cycling\.").is_match(lines[2]));
    }
}
