// # Logging
//
// Every line goes to stderr and, for commands that log to a file, to
// `<log_dir>/dns.log`:
//
// ```text
// [2024-05-01 12:00:00] INFO: Current IPv4 address: 203.0.113.7
// ```
//
// The file is rotated by size. When it would grow past `max_bytes` it is
// renamed to `dns.log.1`, older backups shift up by one and anything past
// `backups` is deleted. The file layer writes through
// `tracing_appender::non_blocking`; the returned guard flushes it on drop.

use ddns_core::config::LogConfig;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{Dispatch, Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};
use tracing_subscriber::fmt::{self as fmt_layer, FmtContext};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[timestamp] LEVEL: message` line format
struct LineFormat {
    timer: ChronoLocal,
}

impl LineFormat {
    fn new() -> Self {
        Self {
            timer: ChronoLocal::new(TIMESTAMP_FORMAT.to_string()),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
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
        write!(writer, "[")?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "] {}: ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// A file writer that rotates by size
#[derive(Debug)]
pub struct SizeRotatingWriter {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    size: u64,
}

impl SizeRotatingWriter {
    /// Open (or create) `path` in append mode
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            size,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        remove_if_exists(&self.backup_path(self.backups))?;
        for index in (1..self.backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Build the log dispatcher for a command
///
/// Returns the dispatcher and, when the file layer is active, the guard
/// that must be held until the command finishes. If the log file cannot be
/// opened a warning is printed and only the console layer is installed.
pub fn build(config: &LogConfig, with_file: bool) -> (Dispatch, Option<WorkerGuard>) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt_layer::layer()
        .event_format(LineFormat::new())
        .with_writer(io::stderr);

    let mut guard = None;
    let file_layer = if with_file {
        match SizeRotatingWriter::open(config.file_path(), config.max_bytes, config.backups) {
            Ok(writer) => {
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(writer);
                guard = Some(worker_guard);
                Some(
                    fmt_layer::layer()
                        .event_format(LineFormat::new())
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
            }
            Err(e) => {
                eprintln!(
                    "WARNING: cannot open log file {}: {} (logging to console only; run `ddnsctl setup`)",
                    config.file_path().display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer);

    (Dispatch::new(subscriber), guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_lines(writer: &mut SizeRotatingWriter, count: usize, line: &str) {
        for _ in 0..count {
            writer.write_all(line.as_bytes()).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns.log");
        fs::write(&path, "earlier\n").unwrap();

        let mut writer = SizeRotatingWriter::open(&path, 1024, 3).unwrap();
        write_lines(&mut writer, 1, "later\n");

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn rotates_when_limit_would_be_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns.log");

        let mut writer = SizeRotatingWriter::open(&path, 20, 3).unwrap();
        write_lines(&mut writer, 2, "0123456789\n");

        assert_eq!(fs::read_to_string(&path).unwrap(), "0123456789\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("dns.log.1")).unwrap(),
            "0123456789\n"
        );
    }

    #[test]
    fn keeps_at_most_configured_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns.log");

        let mut writer = SizeRotatingWriter::open(&path, 10, 3).unwrap();
        for i in 0..6 {
            writer.write_all(format!("line-{:04}\n", i).as_bytes()).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "line-0005\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("dns.log.1")).unwrap(),
            "line-0004\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("dns.log.3")).unwrap(),
            "line-0002\n"
        );
        assert!(!dir.path().join("dns.log.4").exists());
    }

    #[test]
    fn zero_backups_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns.log");

        let mut writer = SizeRotatingWriter::open(&path, 10, 0).unwrap();
        write_lines(&mut writer, 2, "abcdefgh\n");

        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdefgh\n");
        assert!(!dir.path().join("dns.log.1").exists());
    }

    #[test]
    fn missing_log_directory_falls_back_to_console() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            dir: dir.path().join("does-not-exist"),
            ..LogConfig::default()
        };

        let (_dispatch, guard) = build(&config, true);
        assert!(guard.is_none());
    }

    #[test]
    fn file_layer_writes_formatted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            dir: dir.path().to_path_buf(),
            ..LogConfig::default()
        };

        let (dispatch, guard) = build(&config, true);
        assert!(guard.is_some());
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("Current IPv4 address: 203.0.113.7");
            tracing::debug!("not at info level");
        });
        drop(guard);

        let text = fs::read_to_string(config.file_path()).unwrap();
        let line = text.lines().next().unwrap();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] INFO: Current IPv4 address: 203.0.113.7"));
        assert_eq!(text.lines().count(), 1);
    }
}
