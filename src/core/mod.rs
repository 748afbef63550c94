// Core types
pub mod types;
pub use types::*;

// Typed errors
pub mod error;
pub use error::{ConfigurationError, DetectionError, InconsistentStateError, ValidationError};

// Validated system snapshots
pub mod state;
pub use state::{MultiInstanceState, Need, SingleInstanceState, get_need};

// Graph implementation
pub mod graph;
pub use graph::{ResourceAllocationGraph, WaitForGraph, build_rag};

// Trace events
pub mod trace;
pub use trace::{Counts, DfsEvent, RecoveryEvent, SafetyEvent, TraceEvent};

// Deadlock detectors
pub mod detector;
pub use detector::{
    detect_cycle, detect_cycle_with, detect_multi_instance_deadlock,
    detect_multi_instance_deadlock_with, detect_single_instance_deadlock,
    detect_single_instance_deadlock_with,
};

// Recovery simulation
pub mod recovery;
pub use recovery::{RecoveryOutcome, RecoveryStep, Resolution, Strategy, recover, recover_with};

// Logging functionality
pub mod logger;
pub use logger::init_logger;

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

type Callback = Arc<dyn Fn(DeadlockInfo) + Send + Sync + 'static>;

/// deadlock-lab configuration struct
pub struct DeadlockLab {
    log_path: Option<String>,
    callback: Callback,
}

impl Default for DeadlockLab {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlockLab {
    /// Create a new DeadlockLab with default settings
    ///
    /// By default:
    /// - Logging is disabled
    /// - Callback prints the deadlock information to stderr
    pub fn new() -> Self {
        DeadlockLab {
            log_path: None,
            callback: Arc::new(|info: DeadlockInfo| {
                eprintln!(
                    "Deadlock detected: {}",
                    serde_json::to_string_pretty(&info).unwrap_or_else(|_| format!("{info:?}"))
                );
            }),
        }
    }

    /// Activate logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Set a custom callback to be invoked when a deadlock is detected
    ///
    /// # Arguments
    /// * `callback` - Function to call when a deadlock is detected
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(DeadlockInfo) + Send + Sync + 'static,
    {
        self.callback = Arc::new(callback);
        self
    }

    /// Start a detection session with the configured settings
    ///
    /// # Errors
    /// Returns an error if logger initialization fails
    pub fn start(self) -> Result<Session> {
        if let Some(log_path) = self.log_path {
            init_logger(Some(log_path)).context("Failed to initialize logger")?;
        }

        Ok(Session {
            callback: self.callback,
        })
    }
}

/// A running detection session
///
/// Runs the engines, forwards their trace events to the event logger when
/// logging is enabled and invokes the callback whenever a check reports a
/// deadlock.
#[derive(Clone)]
pub struct Session {
    callback: Callback,
}

impl Session {
    /// Check a single-instance state
    pub fn check_single(&self, state: &SingleInstanceState) -> Verdict {
        self.check_single_with(state, |_| {})
    }

    /// Check a single-instance state, also passing every DFS step to `observer`
    pub fn check_single_with<F>(&self, state: &SingleInstanceState, mut observer: F) -> Verdict
    where
        F: FnMut(&DfsEvent),
    {
        let logging = logger::is_logging_enabled();
        let verdict = detect_single_instance_deadlock_with(state, |event| {
            observer(&event);
            if logging {
                logger::log_event(Engine::SingleInstance, &event.into());
            }
        });

        if let Some(cycle) = verdict.cycle() {
            self.report(DeadlockInfo {
                engine: Engine::SingleInstance,
                witness: Witness::Cycle(cycle.clone()),
                // Each process on the cycle waits for the next one
                processes: cycle.processes(),
                timestamp: Utc::now().to_rfc3339(),
            });
        }
        verdict
    }

    /// Check a multi-instance state with the Banker's algorithm
    ///
    /// # Errors
    /// Returns `InconsistentStateError` when some allocation exceeds its maximum
    pub fn check_multi(&self, state: &MultiInstanceState) -> Result<Verdict, DetectionError> {
        self.check_multi_with(state, |_| {})
    }

    /// Check a multi-instance state, also passing every safety step to `observer`
    pub fn check_multi_with<F>(
        &self,
        state: &MultiInstanceState,
        mut observer: F,
    ) -> Result<Verdict, DetectionError>
    where
        F: FnMut(&SafetyEvent),
    {
        let logging = logger::is_logging_enabled();
        let verdict = detect_multi_instance_deadlock_with(state, |event| {
            observer(&event);
            if logging {
                logger::log_event(Engine::MultiInstance, &event.into());
            }
        })?;

        if let Some(unfinished) = verdict.unfinished() {
            self.report(DeadlockInfo {
                engine: Engine::MultiInstance,
                witness: Witness::Unfinished(unfinished.to_vec()),
                processes: unfinished.to_vec(),
                timestamp: Utc::now().to_rfc3339(),
            });
        }
        Ok(verdict)
    }

    /// Simulate recovery of a multi-instance state
    pub fn recover(
        &self,
        state: &MultiInstanceState,
        strategy: Strategy,
    ) -> Result<RecoveryOutcome, DetectionError> {
        self.recover_with(state, strategy, |_| {})
    }

    /// Simulate recovery, also passing every event to `observer`
    pub fn recover_with<F>(
        &self,
        state: &MultiInstanceState,
        strategy: Strategy,
        mut observer: F,
    ) -> Result<RecoveryOutcome, DetectionError>
    where
        F: FnMut(&TraceEvent),
    {
        let logging = logger::is_logging_enabled();
        recover_with(state, strategy, |event| {
            observer(&event);
            if logging {
                logger::log_event(Engine::MultiInstance, &event);
            }
        })
    }

    fn report(&self, info: DeadlockInfo) {
        (self.callback)(info);
    }
}
