use std::io::Write;
use std::sync::OnceLock;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::ImportError;

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Writes `timestamp LEVEL target: message` lines to stderr.
#[derive(Debug)]
struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(
            &jiff::Zoned::now().to_string(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_record(timestamp: &str, level: Level, target: &str, message: &str) -> String {
    format!("{timestamp} {:<5} {target}: {message}", level.as_str())
}

/// Install the stderr logger as the global `log` backend.
pub fn init_logging(level: LevelFilter) {
    let logger = LOGGER.get_or_init(|| StderrLogger { level });
    if log::set_logger(logger).is_err() {
        eprintln!("Warning: Logging system already initialized");
        return;
    }
    log::set_max_level(logger.level);
}

/// Log an import error at error level, with an optional context prefix.
pub fn log_import_error(error: &ImportError, context: Option<&str>) {
    match context {
        Some(ctx) => log::error!("{ctx}: {error}"),
        None => log::error!("{error}"),
    }
}

/// Result extension for convenient error logging
pub trait ResultExt<T, E> {
    fn log_error(self, context: Option<&str>) -> Self;
}

impl<T> ResultExt<T, ImportError> for Result<T, ImportError> {
    fn log_error(self, context: Option<&str>) -> Self {
        if let Err(ref error) = self {
            log_import_error(error, context);
        }
        self
    }
}
