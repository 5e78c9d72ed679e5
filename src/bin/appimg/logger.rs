use std::io::Write;
use std::sync::OnceLock;

use log::Level;
use log::LevelFilter;
use log::Log;
use log::Metadata;
use log::Record;
use log::SetLoggerError;

/// Writes log records to standard error.
///
/// Debug and trace records are prefixed with the module they come from.
pub struct Logger {
    max_level: LevelFilter,
}

impl Logger {
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| Logger { max_level });
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = match record.level() {
            Level::Error => format!("ERROR: {}\n", record.args()),
            Level::Warn => format!("WARNING: {}\n", record.args()),
            Level::Info => format!("{}\n", record.args()),
            Level::Debug | Level::Trace => format!("[{}] {}\n", record.target(), record.args()),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();
