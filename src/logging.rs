use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use time::UtcOffset;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{self, EnvFilter, fmt, prelude::*};

const LOG_RETENTION_DAYS: u64 = 7;

/// Where session logs go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFile {
    /// stderr only
    Disabled,
    /// A new `session-<timestamp>-<pid>.log` in the user cache directory
    Session,
    /// An explicit file (appended to)
    Path(PathBuf),
}

/// Log directory in the user-specific OS cache directory
/// - Linux: ~/.cache/hs-autocomplete/
/// - macOS: ~/Library/Caches/hs-autocomplete/
/// - Windows: %LOCALAPPDATA%\hs-autocomplete\
fn get_log_dir() -> io::Result<PathBuf> {
    let mut log_dir = dirs::cache_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Unable to determine user cache directory"))?;
    log_dir.push("hs-autocomplete");
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Remove session logs older than LOG_RETENTION_DAYS
fn cleanup_old_logs(log_dir: &Path) {
    let retention = Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);
    let now = SystemTime::now();
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !(name.starts_with("session-") && name.ends_with(".log")) {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);
        if expired {
            if let Err(e) = fs::remove_file(entry.path()) {
                eprintln!("Failed to remove old log file {:?}: {}", entry.path(), e);
            }
        }
    }
}

fn session_log_path() -> io::Result<PathBuf> {
    let log_dir = get_log_dir()?;
    cleanup_old_logs(&log_dir);

    let timestamp = time::OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]-[hour][minute][second]"))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(log_dir.join(format!("session-{}-{}.log", timestamp, std::process::id())))
}

/// Initialize the tracing subscriber
///
/// Returns a WorkerGuard that must be kept alive for the duration of the program
/// so buffered file output is flushed.
///
/// # Arguments
/// * `no_color` - Disable ANSI colors in stderr output
/// * `log_level` - Override log level (otherwise uses RUST_LOG or defaults to "info")
/// * `log_file` - Additionally log at DEBUG level to a file
pub fn init_logger(no_color: bool, log_level: Option<&str>, log_file: LogFile) -> io::Result<WorkerGuard> {
    let timer = fmt::time::OffsetTime::new(
        UtcOffset::UTC,
        format_description!("[[[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z]"),
    );

    let stderr_filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer.clone())
        .with_ansi(!no_color)
        .with_filter(stderr_filter);

    let path = match log_file {
        LogFile::Disabled => None,
        LogFile::Session => Some(session_log_path()?),
        LogFile::Path(path) => Some(path),
    };

    let (file_layer, guard) = match &path {
        Some(path) => {
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), guard)
        }
        None => {
            let (_, guard) = tracing_appender::non_blocking(io::sink());
            (None, guard)
        }
    };

    let result = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    match result {
        Ok(()) => {
            if let Some(path) = &path {
                eprintln!("Logging to file: {:?}", path);
            }
            Ok(guard)
        }
        // Tests and embedders may have installed a subscriber already
        Err(e) if e.to_string().contains("already been set") || e.to_string().contains("SetLoggerError") => Ok(guard),
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("session-20260101-000000-1.log");
        let other = dir.path().join("notes.txt");
        fs::write(&session, "x").unwrap();
        fs::write(&other, "y").unwrap();

        cleanup_old_logs(dir.path());
        assert!(session.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_init_twice_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let _first = init_logger(true, Some("debug"), LogFile::Path(path.clone())).unwrap();
        let _second = init_logger(true, Some("debug"), LogFile::Disabled).unwrap();
        assert!(path.exists());
    }
}
