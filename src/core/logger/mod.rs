//! Logging functionality for deadlock-lab
//!
//! This module records the trace events of detection and recovery runs as
//! JSON lines, one `{ timestamp, engine, event }` object per line.

mod event_logger;

pub use event_logger::{
    EventLogger, LogEntry, LoggerMode, flush_logs, get_current_log_file, init_logger,
    is_logging_enabled, log_event,
};
