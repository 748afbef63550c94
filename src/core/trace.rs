//! Step-by-step trace events emitted by the engines
//!
//! The cycle detector and the safety checker are implemented once. Anything
//! that wants to narrate, animate or log a run passes an observer closure and
//! receives these events in execution order. Every event renders to a plain
//! one-line description through `Display`.

use crate::core::types::{Cycle, Node, ProcessId, ResourceId, join};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Instance counts labelled with their resources, in resource order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counts(pub Vec<(ResourceId, u32)>);

impl Counts {
    pub(crate) fn labelled(resources: &[ResourceId], values: &[u32]) -> Self {
        Counts(resources.iter().cloned().zip(values.iter().copied()).collect())
    }

    pub fn get(&self, resource: &ResourceId) -> Option<u32> {
        self.0.iter().find(|(r, _)| r == resource).map(|&(_, n)| n)
    }

    pub fn values(&self) -> Vec<u32> {
        self.0.iter().map(|&(_, n)| n).collect()
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (resource, count)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{resource}: {count}")?;
        }
        Ok(())
    }
}

impl Serialize for Counts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (resource, count) in &self.0 {
            map.serialize_entry(resource, count)?;
        }
        map.end()
    }
}

/// Events of the depth-first cycle search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DfsEvent {
    /// A new DFS tree is started from an unvisited process
    Start { node: Node },
    /// A node is entered and pushed on the recursion stack
    Visit { node: Node },
    /// The edge `from -> to` is examined
    CheckEdge { from: Node, to: Node },
    /// A node is finished without a cycle through it
    Backtrack { node: Node },
    /// A back edge closed a cycle; the search stops
    CycleFound { cycle: Cycle },
}

impl fmt::Display for DfsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfsEvent::Start { node } => write!(f, "Starting a new search at process {node}."),
            DfsEvent::Visit { node } => write!(f, "Visiting {node}."),
            DfsEvent::CheckEdge { from, to } => write!(f, "From {from}, checking neighbor {to}."),
            DfsEvent::Backtrack { node } => write!(f, "Done with {node}. Backtracking."),
            DfsEvent::CycleFound { cycle } => write!(f, "Cycle detected: {cycle}."),
        }
    }
}

/// Events of the Banker's safety check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SafetyEvent {
    /// A new scan over the unfinished processes begins
    Scan { round: usize, work: Counts },
    /// `need <= work` was evaluated for a process
    Check {
        process: ProcessId,
        need: Counts,
        work: Counts,
        runnable: bool,
    },
    /// A process hypothetically finishes and returns its allocation
    Finish {
        process: ProcessId,
        released: Counts,
        work: Counts,
    },
    /// A whole scan made no progress
    Stuck { unfinished: Vec<ProcessId> },
}

impl fmt::Display for SafetyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyEvent::Scan { round, work } => write!(
                f,
                "Step {round}: scanning for a process that can run with work [{work}]."
            ),
            SafetyEvent::Check {
                process,
                need,
                work,
                runnable,
            } => {
                if *runnable {
                    write!(f, "{process} needs [{need}] which fits in work [{work}].")
                } else {
                    write!(f, "{process} needs [{need}] but work is only [{work}].")
                }
            }
            SafetyEvent::Finish {
                process,
                released,
                work,
            } => write!(
                f,
                "{process} completes and returns [{released}]. New work [{work}]."
            ),
            SafetyEvent::Stuck { unfinished } => write!(
                f,
                "No process can proceed. Unfinished: [{}].",
                join(unfinished)
            ),
        }
    }
}

/// Events of a recovery simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// A victim was chosen for this step
    Victim {
        step: usize,
        process: ProcessId,
        score: u64,
    },
    /// The victim's instances went back to the pool
    Released {
        process: ProcessId,
        released: Counts,
        available: Counts,
    },
    /// The victim held nothing to take back
    NothingToRelease { process: ProcessId },
    /// The safety check after this step
    Checked { step: usize, safe: bool },
}

impl fmt::Display for RecoveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryEvent::Victim {
                step,
                process,
                score,
            } => write!(f, "Step {step}: selected {process} as victim (score {score})."),
            RecoveryEvent::Released {
                process,
                released,
                available,
            } => write!(
                f,
                "Released [{released}] from {process}. Available now [{available}]."
            ),
            RecoveryEvent::NothingToRelease { process } => {
                write!(f, "{process} holds nothing to release.")
            }
            RecoveryEvent::Checked { step, safe } => {
                if *safe {
                    write!(f, "Step {step}: the system is now safe.")
                } else {
                    write!(f, "Step {step}: the system is still unsafe.")
                }
            }
        }
    }
}

/// Any trace event, tagged with the stage that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Dfs(DfsEvent),
    Safety(SafetyEvent),
    Recovery(RecoveryEvent),
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Dfs(event) => event.fmt(f),
            TraceEvent::Safety(event) => event.fmt(f),
            TraceEvent::Recovery(event) => event.fmt(f),
        }
    }
}

impl From<DfsEvent> for TraceEvent {
    fn from(event: DfsEvent) -> Self {
        TraceEvent::Dfs(event)
    }
}

impl From<SafetyEvent> for TraceEvent {
    fn from(event: SafetyEvent) -> Self {
        TraceEvent::Safety(event)
    }
}

impl From<RecoveryEvent> for TraceEvent {
    fn from(event: RecoveryEvent) -> Self {
        TraceEvent::Recovery(event)
    }
}
