use crate::core::state::SingleInstanceState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix every single-instance process name must start with
pub const PROCESS_PREFIX: &str = "P";

/// Prefix of canonical resource names (`R1`, `R2`, ...)
pub const RESOURCE_PREFIX: &str = "R";

/// Largest number of processes a system may declare
pub const MAX_PROCESSES: usize = 10;

/// Largest number of resources a system may declare
pub const MAX_RESOURCES: usize = 10;

/// Process identifier type
///
/// An opaque name, canonically formatted `P<n>`. Uniqueness is required within
/// a single system state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(name: impl Into<String>) -> Self {
        ProcessId(name.into())
    }

    /// Canonical name of the `n`-th process (1-based): `P<n>`
    pub fn nth(n: usize) -> Self {
        ProcessId(format!("{PROCESS_PREFIX}{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(name: &str) -> Self {
        ProcessId::new(name)
    }
}

impl From<String> for ProcessId {
    fn from(name: String) -> Self {
        ProcessId(name)
    }
}

impl From<&ProcessId> for ProcessId {
    fn from(id: &ProcessId) -> Self {
        id.clone()
    }
}

/// Resource identifier type
///
/// An opaque name, canonically formatted `R<n>`. In a single-instance system a
/// resource is exactly one allocatable unit; in a multi-instance system it names
/// a class with a fixed number of instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceId(name.into())
    }

    /// Canonical name of the `n`-th resource (1-based): `R<n>`
    pub fn nth(n: usize) -> Self {
        ResourceId(format!("{RESOURCE_PREFIX}{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        ResourceId::new(name)
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        ResourceId(name)
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(id: &ResourceId) -> Self {
        id.clone()
    }
}

/// A vertex of the resource-allocation graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Node {
    Process(ProcessId),
    Resource(ResourceId),
}

impl Node {
    pub fn process(name: impl Into<ProcessId>) -> Self {
        Node::Process(name.into())
    }

    pub fn resource(name: impl Into<ResourceId>) -> Self {
        Node::Resource(name.into())
    }

    pub fn is_process(&self) -> bool {
        matches!(self, Node::Process(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Node::Resource(_))
    }

    pub fn as_process(&self) -> Option<&ProcessId> {
        match self {
            Node::Process(p) => Some(p),
            Node::Resource(_) => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceId> {
        match self {
            Node::Process(_) => None,
            Node::Resource(r) => Some(r),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Process(p) => p.fmt(f),
            Node::Resource(r) => r.fmt(f),
        }
    }
}

/// A closed cycle in a resource-allocation graph
///
/// The first and last node are equal, and every consecutive pair is an edge of
/// the graph the cycle was found in. Cycles found by the detector begin at a
/// process and follow the direction of traversal (process -> resource ->
/// process -> ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cycle(Vec<Node>);

impl Cycle {
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        debug_assert!(nodes.len() >= 2 && nodes.first() == nodes.last());
        Cycle(nodes)
    }

    /// The closed node list, first element repeated at the end
    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    /// Number of distinct nodes on the cycle
    pub fn len(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consecutive `(from, to)` pairs, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.0.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Processes on the cycle, in cycle order, without the closing repeat
    pub fn processes(&self) -> Vec<ProcessId> {
        self.0[..self.len()]
            .iter()
            .filter_map(Node::as_process)
            .cloned()
            .collect()
    }

    /// Resources on the cycle, in cycle order, without the closing repeat
    pub fn resources(&self) -> Vec<ResourceId> {
        self.0[..self.len()]
            .iter()
            .filter_map(Node::as_resource)
            .cloned()
            .collect()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.0.contains(node)
    }

    /// One line per process on the cycle: what it holds, what it is blocked
    /// on, and who holds that
    ///
    /// The cycle alternates `process -> requested resource -> holder`, so each
    /// process node is read together with the two nodes that follow it.
    pub fn details(&self, state: &SingleInstanceState) -> Vec<WaitDetail> {
        self.0
            .windows(3)
            .filter_map(|w| {
                let process = w[0].as_process()?;
                Some(WaitDetail {
                    process: process.clone(),
                    holds: state.held(process).to_vec(),
                    requests: w[1].as_resource()?.clone(),
                    holder: w[2].as_process()?.clone(),
                })
            })
            .collect()
    }
}

/// A single blocking step along a deadlock cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitDetail {
    pub process: ProcessId,
    pub holds: Vec<ResourceId>,
    pub requests: ResourceId,
    pub holder: ProcessId,
}

impl fmt::Display for WaitDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} holds [{}] and requests {}, which is held by {}",
            self.process,
            join(&self.holds),
            self.requests,
            self.holder
        )
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            node.fmt(f)?;
        }
        Ok(())
    }
}

/// Which detection engine produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Resource-allocation-graph cycle detection
    SingleInstance,
    /// Banker's algorithm safety check
    MultiInstance,
}

/// Why a single-instance check had nothing to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    NothingAllocatedOrRequested,
    NothingAllocated,
    NothingRequested,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Advisory::NothingAllocatedOrRequested => {
                "Please allocate and request resources before detecting deadlock."
            }
            Advisory::NothingAllocated => {
                "No resources are allocated. Please allocate resources before detecting deadlock."
            }
            Advisory::NothingRequested => {
                "No resources are requested. Please request resources before detecting deadlock."
            }
        };
        f.write_str(message)
    }
}

/// Supporting evidence for a deadlock-free verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Evidence {
    /// The state holds nothing worth checking
    Advisory(Advisory),
    /// The resource-allocation graph is acyclic
    NoCycle,
    /// Every process can finish in this order
    SafeSequence(Vec<ProcessId>),
}

/// Proof that a system is deadlocked (or, for the Banker's check, unsafe)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Witness {
    /// A cycle in the resource-allocation graph
    Cycle(Cycle),
    /// Processes that cannot be scheduled to finish, in declaration order
    Unfinished(Vec<ProcessId>),
}

/// Result of a deadlock detection call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    NoDeadlock { evidence: Evidence },
    Deadlock { witness: Witness },
}

impl Verdict {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Verdict::Deadlock { .. })
    }

    /// The cycle witness, if this is a single-instance deadlock
    pub fn cycle(&self) -> Option<&Cycle> {
        match self {
            Verdict::Deadlock {
                witness: Witness::Cycle(cycle),
            } => Some(cycle),
            _ => None,
        }
    }

    /// The safe sequence, if this is a safe multi-instance verdict
    pub fn safe_sequence(&self) -> Option<&[ProcessId]> {
        match self {
            Verdict::NoDeadlock {
                evidence: Evidence::SafeSequence(sequence),
            } => Some(sequence),
            _ => None,
        }
    }

    /// The processes that cannot finish, if this is an unsafe multi-instance verdict
    pub fn unfinished(&self) -> Option<&[ProcessId]> {
        match self {
            Verdict::Deadlock {
                witness: Witness::Unfinished(processes),
            } => Some(processes),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoDeadlock { evidence } => match evidence {
                Evidence::Advisory(advisory) => advisory.fmt(f),
                Evidence::NoCycle => f.write_str("No deadlock detected in the system."),
                Evidence::SafeSequence(sequence) => {
                    write!(f, "Safe sequence: [{}]", join(sequence))
                }
            },
            Verdict::Deadlock { witness } => match witness {
                Witness::Cycle(cycle) => {
                    write!(f, "A deadlock has been detected involving: {cycle}")
                }
                Witness::Unfinished(processes) => write!(
                    f,
                    "No safe sequence found. System MAY be in an unsafe state or deadlocked. Unfinished processes: [{}]",
                    join(processes)
                ),
            },
        }
    }
}

pub(crate) fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Represents a detected deadlock
///
/// Passed to the session callback whenever a check ends in a deadlock (or an
/// unsafe state for the Banker's check).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockInfo {
    /// Engine that reported the deadlock
    pub engine: Engine,

    /// Evidence produced by the engine
    pub witness: Witness,

    /// Processes involved
    ///
    /// For a resource-allocation cycle this is the wait-for cycle (processes
    /// only, in waiting order). For the Banker's check it is the unfinished set.
    pub processes: Vec<ProcessId>,

    /// ISO-8601 timestamp of when the deadlock was detected
    pub timestamp: String,
}
