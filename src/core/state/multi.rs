//! Multi-instance system state and the need calculator
//!
//! Resources are classes with a fixed number of instances. All per-process data
//! lives in dense matrices indexed by a stable process order (the order of the
//! `allocation` input) and resource order (the order of the `total` input).
//! Shapes are validated once, at construction, so the algorithms never have to
//! guess a missing entry.

use crate::core::error::{
    ConfigurationError, DetectionError, InconsistentStateError, Matrix, ValidationError,
};
use crate::core::types::{MAX_PROCESSES, MAX_RESOURCES, ProcessId, ResourceId};
use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Instance counts per resource, as supplied by callers
pub type ResourceCounts = Vec<(ResourceId, u32)>;

/// Per-process instance counts, as supplied by callers
pub type ProcessMatrix = Vec<(ProcessId, ResourceCounts)>;

/// Validated snapshot of a multi-instance system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiInstanceState {
    processes: Vec<ProcessId>,
    resources: Vec<ResourceId>,
    allocation: Vec<Vec<u32>>,
    max: Vec<Vec<u32>>,
    available: Vec<u32>,
    total: Vec<u32>,
}

/// The need matrix: `max - allocation`, never negative
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Need {
    processes: Vec<ProcessId>,
    resources: Vec<ResourceId>,
    matrix: Vec<Vec<u32>>,
}

impl MultiInstanceState {
    /// Build and validate a multi-instance state
    ///
    /// # Arguments
    /// * `allocation` - process -> resource -> instances currently held. Its
    ///   process order becomes the state's process order.
    /// * `max` - process -> resource -> maximum instances ever requested
    /// * `available` - free instances per resource. When `None` it is derived
    ///   as `total - sum(allocation)`.
    /// * `total` - instances per resource class. Its order becomes the state's
    ///   resource order.
    ///
    /// Every row must name every resource exactly once. `allocation <= max` is
    /// not checked here; [`get_need`] reports it.
    ///
    /// # Errors
    /// * `ConfigurationError` when there are no resources or a domain cap is exceeded
    /// * `ValidationError` for duplicated, missing or unknown names
    /// * `InconsistentStateError::AllocationExceedsTotal` when `available` has
    ///   to be derived and some resource is over-allocated
    /// * `InconsistentStateError::InstanceCountOverflow` when a supplied
    ///   `available` plus everything allocated does not fit in a `u32`
    pub fn new(
        allocation: ProcessMatrix,
        max: ProcessMatrix,
        available: Option<ResourceCounts>,
        total: ResourceCounts,
    ) -> Result<Self, DetectionError> {
        if total.is_empty() {
            return Err(ConfigurationError::NoResources.into());
        }
        if total.len() > MAX_RESOURCES {
            return Err(ConfigurationError::TooManyResources {
                count: total.len(),
                max: MAX_RESOURCES,
            }
            .into());
        }
        if allocation.len() > MAX_PROCESSES {
            return Err(ConfigurationError::TooManyProcesses {
                count: allocation.len(),
                max: MAX_PROCESSES,
            }
            .into());
        }

        let mut resource_index: FxHashMap<ResourceId, usize> = FxHashMap::default();
        let mut resources = Vec::with_capacity(total.len());
        let mut total_counts = Vec::with_capacity(total.len());
        for (resource, count) in total {
            if resource_index.insert(resource.clone(), resources.len()).is_some() {
                return Err(ValidationError::DuplicateResource { resource }.into());
            }
            resources.push(resource);
            total_counts.push(count);
        }

        let mut process_index: FxHashMap<ProcessId, usize> = FxHashMap::default();
        let mut processes = Vec::with_capacity(allocation.len());
        let mut allocation_rows = Vec::with_capacity(allocation.len());
        for (process, row) in allocation {
            if process_index.contains_key(&process) {
                return Err(ValidationError::DuplicateProcess {
                    process,
                    matrix: Matrix::Allocation,
                }
                .into());
            }
            let dense = dense_row(&process, row, &resources, &resource_index, Matrix::Allocation)?;
            process_index.insert(process.clone(), processes.len());
            processes.push(process);
            allocation_rows.push(dense);
        }

        let mut max_rows: Vec<Option<Vec<u32>>> = vec![None; processes.len()];
        for (process, row) in max {
            let Some(&slot) = process_index.get(&process) else {
                return Err(ValidationError::UnknownProcess {
                    process,
                    matrix: Matrix::Max,
                }
                .into());
            };
            if max_rows[slot].is_some() {
                return Err(ValidationError::DuplicateProcess {
                    process,
                    matrix: Matrix::Max,
                }
                .into());
            }
            max_rows[slot] = Some(dense_row(&process, row, &resources, &resource_index, Matrix::Max)?);
        }
        let max_rows = max_rows
            .into_iter()
            .zip(&processes)
            .map(|(row, process)| {
                row.ok_or_else(|| ValidationError::MissingRow {
                    process: process.clone(),
                    matrix: Matrix::Max,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let available = match available {
            Some(counts) => dense_available(counts, &resources, &resource_index)?,
            None => derive_available(&resources, &total_counts, &allocation_rows)?,
        };
        check_instance_counts(&resources, &available, &allocation_rows)?;

        Ok(MultiInstanceState {
            processes,
            resources,
            allocation: allocation_rows,
            max: max_rows,
            available,
            total: total_counts,
        })
    }

    /// Start building a state row by row
    pub fn builder() -> MultiInstanceBuilder {
        MultiInstanceBuilder::default()
    }

    /// Processes in declaration order
    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Allocation row of the `i`-th process, aligned with [`resources`](Self::resources)
    pub fn allocation_row(&self, i: usize) -> &[u32] {
        &self.allocation[i]
    }

    /// Max row of the `i`-th process, aligned with [`resources`](Self::resources)
    pub fn max_row(&self, i: usize) -> &[u32] {
        &self.max[i]
    }

    /// Free instances per resource
    pub fn available(&self) -> &[u32] {
        &self.available
    }

    /// Total instances per resource
    pub fn total(&self) -> &[u32] {
        &self.total
    }

    pub fn process_index(&self, process: &ProcessId) -> Option<usize> {
        self.processes.iter().position(|p| p == process)
    }

    pub fn resource_index(&self, resource: &ResourceId) -> Option<usize> {
        self.resources.iter().position(|r| r == resource)
    }

    /// Instances of `resource` allocated to `process`
    pub fn allocation(&self, process: &ProcessId, resource: &ResourceId) -> Option<u32> {
        Some(self.allocation[self.process_index(process)?][self.resource_index(resource)?])
    }

    /// Declared maximum of `resource` for `process`
    pub fn max(&self, process: &ProcessId, resource: &ResourceId) -> Option<u32> {
        Some(self.max[self.process_index(process)?][self.resource_index(resource)?])
    }

    /// Copy of this state with one process's allocation returned to the pool
    ///
    /// Released instances never overflow: construction guarantees that
    /// `available + sum(allocation)` fits in a `u32` for every resource.
    ///
    /// The process stays in the system holding nothing, so its need grows back
    /// to its declared maximum.
    pub fn with_preempted(&self, process: usize) -> MultiInstanceState {
        let mut next = self.clone();
        for (free, held) in next.available.iter_mut().zip(next.allocation[process].iter_mut()) {
            *free += std::mem::take(held);
        }
        next
    }

    /// Copy of this state with one process removed and its allocation returned
    pub fn without_process(&self, process: usize) -> MultiInstanceState {
        let mut next = self.clone();
        let released = next.allocation.remove(process);
        next.max.remove(process);
        next.processes.remove(process);
        for (free, held) in next.available.iter_mut().zip(released) {
            *free += held;
        }
        next
    }
}

/// Compute `need = max - allocation` for every process/resource pair
///
/// # Errors
/// `InconsistentStateError::AllocationExceedsMax` for the first pair (process
/// order, then resource order) whose allocation exceeds its maximum. The value
/// is never clamped.
pub fn get_need(state: &MultiInstanceState) -> Result<Need, InconsistentStateError> {
    let mut matrix = Vec::with_capacity(state.processes.len());
    for (p, process) in state.processes.iter().enumerate() {
        let mut row = Vec::with_capacity(state.resources.len());
        for (r, resource) in state.resources.iter().enumerate() {
            let (allocation, max) = (state.allocation[p][r], state.max[p][r]);
            let need = max
                .checked_sub(allocation)
                .ok_or_else(|| InconsistentStateError::AllocationExceedsMax {
                    process: process.clone(),
                    resource: resource.clone(),
                    allocation,
                    max,
                })?;
            row.push(need);
        }
        matrix.push(row);
    }
    Ok(Need {
        processes: state.processes.clone(),
        resources: state.resources.clone(),
        matrix,
    })
}

impl Need {
    /// Remaining demand of `process` for `resource`
    pub fn get(&self, process: &ProcessId, resource: &ResourceId) -> Option<u32> {
        let p = self.processes.iter().position(|x| x == process)?;
        let r = self.resources.iter().position(|x| x == resource)?;
        Some(self.matrix[p][r])
    }

    /// Need row of the `i`-th process
    pub fn row(&self, i: usize) -> &[u32] {
        &self.matrix[i]
    }

    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Whether the `i`-th process still needs anything at all
    pub fn is_outstanding(&self, i: usize) -> bool {
        self.matrix[i].iter().any(|&n| n > 0)
    }
}

fn dense_row(
    process: &ProcessId,
    row: ResourceCounts,
    resources: &[ResourceId],
    resource_index: &FxHashMap<ResourceId, usize>,
    matrix: Matrix,
) -> Result<Vec<u32>, ValidationError> {
    let mut dense = vec![None; resources.len()];
    for (resource, count) in row {
        let Some(&slot) = resource_index.get(&resource) else {
            return Err(ValidationError::UnknownMatrixResource {
                process: process.clone(),
                resource,
                matrix,
            });
        };
        if dense[slot].replace(count).is_some() {
            return Err(ValidationError::DuplicateEntry {
                process: process.clone(),
                resource,
                matrix,
            });
        }
    }
    dense
        .into_iter()
        .zip(resources)
        .map(|(count, resource)| {
            count.ok_or_else(|| ValidationError::MissingEntry {
                process: process.clone(),
                resource: resource.clone(),
                matrix,
            })
        })
        .collect()
}

fn dense_available(
    counts: ResourceCounts,
    resources: &[ResourceId],
    resource_index: &FxHashMap<ResourceId, usize>,
) -> Result<Vec<u32>, ValidationError> {
    let mut dense = vec![None; resources.len()];
    let mut seen = FxHashSet::default();
    for (resource, count) in counts {
        let Some(&slot) = resource_index.get(&resource) else {
            return Err(ValidationError::UnknownAvailableResource { resource });
        };
        if !seen.insert(slot) {
            return Err(ValidationError::DuplicateResource { resource });
        }
        dense[slot] = Some(count);
    }
    dense
        .into_iter()
        .zip(resources)
        .map(|(count, resource)| {
            count.ok_or_else(|| ValidationError::MissingAvailable {
                resource: resource.clone(),
            })
        })
        .collect()
}

fn derive_available(
    resources: &[ResourceId],
    total: &[u32],
    allocation: &[Vec<u32>],
) -> Result<Vec<u32>, InconsistentStateError> {
    resources
        .iter()
        .enumerate()
        .map(|(r, resource)| {
            let allocated: u64 = allocation.iter().map(|row| u64::from(row[r])).sum();
            u64::from(total[r])
                .checked_sub(allocated)
                .map(|free| free as u32)
                .ok_or_else(|| InconsistentStateError::AllocationExceedsTotal {
                    resource: resource.clone(),
                    allocated,
                    total: total[r],
                })
        })
        .collect()
}

// Every release (a Banker's finish, preemption, termination) adds allocated
// instances back to `available`, so their sum must stay representable.
fn check_instance_counts(
    resources: &[ResourceId],
    available: &[u32],
    allocation: &[Vec<u32>],
) -> Result<(), InconsistentStateError> {
    for (r, resource) in resources.iter().enumerate() {
        let instances = u64::from(available[r])
            + allocation.iter().map(|row| u64::from(row[r])).sum::<u64>();
        if instances > u64::from(u32::MAX) {
            return Err(InconsistentStateError::InstanceCountOverflow {
                resource: resource.clone(),
                instances,
            });
        }
    }
    Ok(())
}

/// Row-by-row construction of a [`MultiInstanceState`]
///
/// Resources are declared first with their totals; each process then supplies
/// its allocation and max rows. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct MultiInstanceBuilder {
    total: ResourceCounts,
    allocation: ProcessMatrix,
    max: ProcessMatrix,
    available: Option<ResourceCounts>,
}

impl MultiInstanceBuilder {
    /// Declare a resource class with `total` instances
    pub fn resource(mut self, resource: impl Into<ResourceId>, total: u32) -> Self {
        self.total.push((resource.into(), total));
        self
    }

    /// Declare a process with its allocation and max rows
    pub fn process<R, A, M>(mut self, process: impl Into<ProcessId>, allocation: A, max: M) -> Self
    where
        R: Into<ResourceId>,
        A: IntoIterator<Item = (R, u32)>,
        M: IntoIterator<Item = (R, u32)>,
    {
        let process = process.into();
        let row = |entries: Vec<(R, u32)>| -> ResourceCounts {
            entries.into_iter().map(|(r, n)| (r.into(), n)).collect()
        };
        self.allocation
            .push((process.clone(), row(allocation.into_iter().collect())));
        self.max.push((process, row(max.into_iter().collect())));
        self
    }

    /// Supply `available` directly instead of deriving it from the totals
    pub fn available<R, I>(mut self, available: I) -> Self
    where
        R: Into<ResourceId>,
        I: IntoIterator<Item = (R, u32)>,
    {
        self.available = Some(available.into_iter().map(|(r, n)| (r.into(), n)).collect());
        self
    }

    pub fn build(self) -> Result<MultiInstanceState, DetectionError> {
        MultiInstanceState::new(self.allocation, self.max, self.available, self.total)
    }
}
