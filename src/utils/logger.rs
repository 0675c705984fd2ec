//! Logger utility for application-wide logging
//!
//! This module provides a custom logger implementation that works alongside
//! the standard log crate, writing every record to a log file and echoing
//! it to the console.

use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Custom logger implementation
pub struct Logger {
    /// File handle for log output
    file: Mutex<Option<File>>,
    level: LevelFilter,
}

impl Logger {
    /// Creates a new logger appending to `log_file`
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path to the log file; parent directories are created
    /// * `level` - Most verbose level that is recorded
    ///
    /// # Returns
    ///
    /// A new Logger instance or an error if the file cannot be opened
    pub fn new(log_file: &Path, level: LevelFilter) -> io::Result<Self> {
        if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            level,
        })
    }

    /// A logger that only writes to the console
    pub fn console(level: LevelFilter) -> Self {
        Logger {
            file: Mutex::new(None),
            level,
        }
    }

    /// Appends a line to the log file
    pub fn write_line(&self, message: &str) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Static method to initialize the global logger
    ///
    /// Falls back to console-only logging when the file cannot be opened.
    pub fn init_global_logger(log_file: &Path, level: LevelFilter) -> io::Result<()> {
        let (global_logger, open_error) = match Logger::new(log_file, level) {
            Ok(logger) => (logger, None),
            Err(e) => (Logger::console(level), Some(e)),
        };

        if log::set_boxed_logger(Box::new(global_logger)).is_err() {
            eprintln!("Warning: Global logger was already initialized");
        }
        log::set_max_level(level);

        match open_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());
            let _ = self.write_line(&message);

            // Also print to console
            println!("{}", message);
        }
    }

    fn flush(&self) {
        // Already flushing in write_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_records_are_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("geopublish.log");
        let logger = Logger::new(&path, LevelFilter::Info).unwrap();

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("published {}", "dem.tif"))
                .build(),
        );
        logger.log(&Record::builder().level(Level::Debug).args(format_args!("hidden")).build());

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[INFO] published dem.tif\n");
    }

    #[test]
    fn test_console_logger_has_no_file() {
        let logger = Logger::console(LevelFilter::Warn);
        assert!(logger.write_line("ignored").is_ok());
        assert!(!logger.enabled(&Metadata::builder().level(Level::Info).build()));
    }
}
