//! Typed errors raised while building states and running the engines
//!
//! Every error is fatal to the call that produced it: nothing is retried and
//! no approximate verdict is ever returned. Callers are expected to collect new
//! input and build a fresh state.

use crate::core::types::{ProcessId, ResourceId};
use std::fmt;
use thiserror::Error;

/// Which per-process relation a single-instance resource reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Held,
    Wanted,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Held => "resources_held",
            Relation::Wanted => "resources_wanted",
        })
    }
}

/// Which per-process matrix of a multi-instance state an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matrix {
    Allocation,
    Max,
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Matrix::Allocation => "allocation",
            Matrix::Max => "max",
        })
    }
}

/// The system being described is not one the engines accept at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Total resources must be positive.")]
    NoResources,

    #[error("Maximum {max} processes allowed, got {count}.")]
    TooManyProcesses { count: usize, max: usize },

    #[error("Maximum {max} resources allowed, got {count}.")]
    TooManyResources { count: usize, max: usize },
}

/// Structural violation in the supplied state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid process name: {process}")]
    InvalidProcessName { process: ProcessId },

    #[error("Invalid resource {resource} in {relation} for {process}")]
    UnknownResource {
        process: ProcessId,
        resource: ResourceId,
        relation: Relation,
    },

    #[error("Resource {resource} is allocated to multiple processes ({first} and {second})")]
    DoubleAllocation {
        resource: ResourceId,
        first: ProcessId,
        second: ProcessId,
    },

    #[error("Invalid state: {process} requests {resource} which it already holds.")]
    RequestOfHeldResource {
        process: ProcessId,
        resource: ResourceId,
    },

    #[error("Process {process} is declared more than once in {matrix}")]
    DuplicateProcess { process: ProcessId, matrix: Matrix },

    #[error("Resource {resource} is declared more than once")]
    DuplicateResource { resource: ResourceId },

    #[error("Process {process} has no {matrix} row")]
    MissingRow { process: ProcessId, matrix: Matrix },

    #[error("The {matrix} matrix names unknown process {process}")]
    UnknownProcess { process: ProcessId, matrix: Matrix },

    #[error("The {matrix} row of {process} names unknown resource {resource}")]
    UnknownMatrixResource {
        process: ProcessId,
        resource: ResourceId,
        matrix: Matrix,
    },

    #[error("The {matrix} row of {process} has no entry for {resource}")]
    MissingEntry {
        process: ProcessId,
        resource: ResourceId,
        matrix: Matrix,
    },

    #[error("The {matrix} row of {process} lists {resource} more than once")]
    DuplicateEntry {
        process: ProcessId,
        resource: ResourceId,
        matrix: Matrix,
    },

    #[error("Available resources name unknown resource {resource}")]
    UnknownAvailableResource { resource: ResourceId },

    #[error("Available resources have no entry for {resource}")]
    MissingAvailable { resource: ResourceId },
}

/// The numbers in a multi-instance state contradict each other
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InconsistentStateError {
    #[error(
        "Invalid data: Allocation ({allocation}) exceeds Max ({max}) for {process} and {resource}"
    )]
    AllocationExceedsMax {
        process: ProcessId,
        resource: ResourceId,
        allocation: u32,
        max: u32,
    },

    #[error("Invalid data: {allocated} instances of {resource} are allocated but only {total} exist")]
    AllocationExceedsTotal {
        resource: ResourceId,
        allocated: u64,
        total: u32,
    },

    #[error("Invalid data: {instances} instances of {resource} exceed the supported instance count")]
    InstanceCountOverflow { resource: ResourceId, instances: u64 },
}

/// Any error a detection call can fail with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InconsistentState(#[from] InconsistentStateError),
}
