//! Logging setup.
//!
//! The interactive view owns the terminal, so it logs to a file through a
//! non-blocking writer. `--dump` logs to stderr, keeping stdout for the table.
//! `RUST_LOG` overrides the default level unless `--verbose` is given.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "hx300.log";

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// `<dir>/hx300.log`, truncated at startup
    File(PathBuf),
    Stderr,
}

/// Keeps the background writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    /// Log file in use, if any
    pub path: Option<PathBuf>,
}

pub fn init_logging(target: &LogTarget, verbose: bool) -> io::Result<LoggingGuard> {
    let filter = if verbose {
        EnvFilter::new(filter_directive(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(false)))
    };

    let (writer, guard, path) = match target {
        LogTarget::File(dir) => {
            let path = prepare_log_file(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (writer, guard, Some(path))
        }
        LogTarget::Stderr => {
            let (writer, guard) = tracing_appender::non_blocking(io::stderr());
            (writer, guard, None)
        }
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(matches!(target, LogTarget::Stderr))
        .with_target(false);

    tracing_subscriber::registry().with(filter).with(layer).init();

    Ok(LoggingGuard {
        _guard: guard,
        path,
    })
}

/// Default level: info, or debug for this crate with `--verbose`
pub fn filter_directive(verbose: bool) -> &'static str {
    if verbose {
        "info,hx_300=debug,hx300=debug"
    } else {
        "info"
    }
}

/// Create the log directory and start from an empty file
pub fn prepare_log_file(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE);
    fs::write(&path, "")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_debug_for_this_crate() {
        assert!(filter_directive(true).contains("hx_300=debug"));
        assert_eq!(filter_directive(false), "info");
    }

    #[test]
    fn creates_directory_and_clears_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/logs");

        let path = prepare_log_file(&dir).unwrap();
        assert!(path.exists());

        fs::write(&path, "old session").unwrap();
        let path = prepare_log_file(&dir).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }
}
