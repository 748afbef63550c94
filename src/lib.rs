//! # deadlock-lab
//!
//! A deadlock detection engine for operating-systems teaching.
//!
//! deadlock-lab decides whether a snapshot of processes and resources is
//! deadlocked and explains why, step by step.
//!
//! ## Features
//!
//! - Single-instance detection: cycle search over the resource-allocation graph
//! - Multi-instance detection: the Banker's safety algorithm
//! - Strict validation of system snapshots with typed errors
//! - Step-by-step trace events for narration and visualization
//! - Recovery simulation by resource preemption or process termination
//! - JSON-lines event logging
//!
//! ## Example
//!
//! ```
//! use deadlock_lab::SingleInstanceState;
//! use deadlock_lab::detect_single_instance_deadlock;
//!
//! let state = SingleInstanceState::builder(2)
//!     .hold("P1", "R1")
//!     .hold("P2", "R2")
//!     .want("P1", "R2")
//!     .want("P2", "R1")
//!     .build()
//!     .unwrap();
//!
//! let verdict = detect_single_instance_deadlock(&state);
//! assert!(verdict.is_deadlock());
//! ```

mod core;
pub use core::{
    Advisory, ConfigurationError, Counts, Cycle, DeadlockInfo, DeadlockLab, DetectionError,
    DfsEvent, Engine, Evidence, InconsistentStateError, MultiInstanceState, Need, Node,
    ProcessId, RecoveryEvent, RecoveryOutcome, RecoveryStep, Resolution, ResourceAllocationGraph,
    ResourceId, SafetyEvent, Session, SingleInstanceState, Strategy, TraceEvent,
    ValidationError, Verdict, WaitDetail, WaitForGraph, Witness, build_rag, detect_cycle,
    detect_cycle_with, detect_multi_instance_deadlock, detect_multi_instance_deadlock_with,
    detect_single_instance_deadlock, detect_single_instance_deadlock_with, get_need, recover,
    recover_with,
};
pub use core::{detector, error, graph, logger, recovery, state, trace, types};

pub mod scenario;

pub const BANNER: &str = r#"
      ▄ ▄▖▄▖▄ ▖ ▄▖▄▖▖▖  ▖ ▄▖▄
      ▌▌▙▖▌▌▌▌▌ ▌▌▌ ▙▘  ▌ ▌▌▙▘
      ▙▘▙▖▛▌▙▘▙▖▙▌▙▖▌▌  ▙▖▛▌▙▘
"#;
