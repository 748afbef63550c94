use crate::core::trace::TraceEvent;
use crate::core::types::Engine;
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Structure for a single log entry
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    /// Absolute timestamp of when the event occurred (seconds since Unix Epoch)
    pub timestamp: f64,
    /// Engine whose run produced the event
    pub engine: Engine,
    /// The trace event itself
    pub event: &'a TraceEvent,
}

/// Determines how the logger should operate
#[derive(Debug)]
pub enum LoggerMode {
    /// Logging is disabled entirely
    Disabled,
    /// Log to the specified file
    ToFile(BufWriter<File>),
}

/// Logger for recording trace events as JSON lines
pub struct EventLogger {
    mode: LoggerMode,
    path: Option<PathBuf>,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogger {
    /// Create a new logger with logging disabled
    pub fn new() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
            path: None,
        }
    }

    /// Create a new logger that writes to the specified file
    ///
    /// A `{timestamp}` placeholder in the file name is replaced with the
    /// current time. Missing parent directories are created and an existing
    /// file is truncated.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_path(path.as_ref());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .context("Failed to open log file")?;

        Ok(EventLogger {
            mode: LoggerMode::ToFile(BufWriter::new(file)),
            path: Some(path),
        })
    }

    /// Write one event as a JSON line
    pub fn log_event(&mut self, engine: Engine, event: &TraceEvent) {
        let LoggerMode::ToFile(ref mut writer) = self.mode else {
            return;
        };

        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;
        let entry = LogEntry {
            timestamp,
            engine,
            event,
        };

        if let Ok(json) = serde_json::to_string(&entry)
            && let Err(e) = writeln!(writer, "{json}")
        {
            eprintln!("Logger write error: {e:?}");
        }
    }

    /// Flush buffered entries to disk
    pub fn flush(&mut self) -> Result<()> {
        if let LoggerMode::ToFile(ref mut writer) = self.mode {
            writer.flush().context("Failed to flush log file")?;
        }
        Ok(())
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, LoggerMode::Disabled)
    }

    /// File this logger writes to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush logs during EventLogger drop: {e:?}");
        }
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    #[allow(clippy::literal_string_with_formatting_args)]
    let resolved = if raw.contains("{timestamp}") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace("{timestamp}", &timestamp))
    } else {
        path.to_path_buf()
    };
    resolved
}

// Global logger instance
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::new());
}

/// Set the global logger to use the specified file, or disable logging if None
///
/// The previous logger, if any, is flushed and closed.
pub fn init_logger<P: AsRef<Path>>(path: Option<P>) -> Result<()> {
    let next = match path {
        Some(path) => EventLogger::with_file(path).context("Failed to create logger with file")?,
        None => EventLogger::new(),
    };
    *GLOBAL_LOGGER.lock() = next;
    Ok(())
}

/// Log an event to the global logger (if enabled)
pub fn log_event(engine: Engine, event: &TraceEvent) {
    GLOBAL_LOGGER.lock().log_event(engine, event);
}

/// Check if the global logger is enabled
pub fn is_logging_enabled() -> bool {
    GLOBAL_LOGGER.lock().is_enabled()
}

/// Get current log file path
pub fn get_current_log_file() -> Option<PathBuf> {
    GLOBAL_LOGGER.lock().path().map(Path::to_path_buf)
}

/// Flush all buffered log entries of the global logger to disk
pub fn flush_logs() -> Result<()> {
    GLOBAL_LOGGER.lock().flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::trace::{DfsEvent, SafetyEvent};
    use crate::core::types::{Node, ProcessId};
    use tempfile::TempDir;

    #[test]
    fn test_basic_logging() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("basic.log");

        let mut logger = EventLogger::with_file(&log_path).unwrap();
        logger.log_event(
            Engine::SingleInstance,
            &TraceEvent::from(DfsEvent::Visit {
                node: Node::process("P1"),
            }),
        );
        logger.log_event(
            Engine::MultiInstance,
            &TraceEvent::from(SafetyEvent::Stuck {
                unfinished: vec![ProcessId::nth(2)],
            }),
        );
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["engine"], "single_instance");
        assert_eq!(first["event"]["stage"], "dfs");
        assert!(first["timestamp"].as_f64().unwrap() > 0.0);
        assert!(lines[1].contains("\"unfinished\":[\"P2\"]"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let mut logger = EventLogger::new();
        assert!(!logger.is_enabled());
        assert!(logger.path().is_none());
        logger.log_event(
            Engine::SingleInstance,
            &TraceEvent::from(DfsEvent::Visit {
                node: Node::process("P1"),
            }),
        );
        logger.flush().unwrap();
    }

    #[test]
    fn test_timestamp_placeholder_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let pattern = temp_dir.path().join("nested/run_{timestamp}.log");

        let logger = EventLogger::with_file(&pattern).unwrap();
        let path = logger.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run_"));
        assert!(!name.contains("{timestamp}"));
        assert!(path.exists());
    }
}
