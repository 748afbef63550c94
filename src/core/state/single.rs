//! Single-instance system state
//!
//! Every resource has exactly one instance. The state records which process
//! holds which resources and which resources each process is blocked on, and it
//! refuses to exist unless those mappings are consistent.

use crate::core::error::{ConfigurationError, DetectionError, Relation, ValidationError};
use crate::core::types::{MAX_PROCESSES, MAX_RESOURCES, PROCESS_PREFIX, ProcessId, ResourceId};
use fxhash::{FxHashMap, FxHashSet};

/// Validated snapshot of a single-instance system
///
/// Processes keep their declaration order: first appearance in `held`, then
/// first appearance in `wanted`. That order drives the traversal order of the
/// cycle detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleInstanceState {
    processes: Vec<ProcessId>,
    /// Resources held by `processes[i]`
    held: Vec<Vec<ResourceId>>,
    /// Resources requested by `processes[i]`
    wanted: Vec<Vec<ResourceId>>,
    resource_count: usize,
    /// Whether the `held` input had any entry at all, even an empty list
    held_declared: bool,
    wanted_declared: bool,
}

impl SingleInstanceState {
    /// Build and validate a state from `held` and `wanted` mappings
    ///
    /// # Arguments
    /// * `held` - process -> resources it currently holds
    /// * `wanted` - process -> resources it is blocked requesting
    /// * `resource_count` - size of the resource universe `R1..R<n>`
    ///
    /// # Errors
    /// * `ConfigurationError` if `resource_count` is zero or a domain cap is exceeded
    /// * `ValidationError` for bad process names, unknown resources, double
    ///   allocation, or a process requesting a resource it already holds
    pub fn new<H, W, P, I, R>(
        held: H,
        wanted: W,
        resource_count: usize,
    ) -> Result<Self, DetectionError>
    where
        H: IntoIterator<Item = (P, I)>,
        W: IntoIterator<Item = (P, I)>,
        P: Into<ProcessId>,
        I: IntoIterator<Item = R>,
        R: Into<ResourceId>,
    {
        let collect = |entries: Vec<(P, I)>| -> Vec<(ProcessId, Vec<ResourceId>)> {
            entries
                .into_iter()
                .map(|(p, rs)| (p.into(), rs.into_iter().map(Into::into).collect()))
                .collect()
        };
        Self::from_entries(
            collect(held.into_iter().collect()),
            collect(wanted.into_iter().collect()),
            resource_count,
        )
    }

    /// Start building a state over `R1..R<resource_count>`
    pub fn builder(resource_count: usize) -> SingleInstanceBuilder {
        SingleInstanceBuilder {
            resource_count,
            held: Vec::new(),
            wanted: Vec::new(),
        }
    }

    fn from_entries(
        held: Vec<(ProcessId, Vec<ResourceId>)>,
        wanted: Vec<(ProcessId, Vec<ResourceId>)>,
        resource_count: usize,
    ) -> Result<Self, DetectionError> {
        if resource_count == 0 {
            return Err(ConfigurationError::NoResources.into());
        }
        if resource_count > MAX_RESOURCES {
            return Err(ConfigurationError::TooManyResources {
                count: resource_count,
                max: MAX_RESOURCES,
            }
            .into());
        }

        let mut state = SingleInstanceState {
            processes: Vec::new(),
            held: Vec::new(),
            wanted: Vec::new(),
            resource_count,
            held_declared: !held.is_empty(),
            wanted_declared: !wanted.is_empty(),
        };
        let mut index: FxHashMap<ProcessId, usize> = FxHashMap::default();
        for (relation, entries) in [(Relation::Held, held), (Relation::Wanted, wanted)] {
            for (process, resources) in entries {
                let slot = *index.entry(process.clone()).or_insert_with(|| {
                    state.processes.push(process);
                    state.held.push(Vec::new());
                    state.wanted.push(Vec::new());
                    state.processes.len() - 1
                });
                let target = match relation {
                    Relation::Held => &mut state.held[slot],
                    Relation::Wanted => &mut state.wanted[slot],
                };
                for resource in resources {
                    if !target.contains(&resource) {
                        target.push(resource);
                    }
                }
            }
        }

        if state.processes.len() > MAX_PROCESSES {
            return Err(ConfigurationError::TooManyProcesses {
                count: state.processes.len(),
                max: MAX_PROCESSES,
            }
            .into());
        }

        state.validate()?;
        Ok(state)
    }

    /// Run the four consistency checks in their fixed order
    fn validate(&self) -> Result<(), ValidationError> {
        // 1. Process naming convention
        if let Some(process) = self
            .processes
            .iter()
            .find(|p| !p.as_str().starts_with(PROCESS_PREFIX))
        {
            return Err(ValidationError::InvalidProcessName {
                process: process.clone(),
            });
        }

        // 2. Every resource lies in R1..R<n>
        let valid: FxHashSet<ResourceId> = self.resources().into_iter().collect();
        for (relation, lists) in [(Relation::Held, &self.held), (Relation::Wanted, &self.wanted)] {
            for (process, resources) in self.processes.iter().zip(lists) {
                if let Some(resource) = resources.iter().find(|r| !valid.contains(*r)) {
                    return Err(ValidationError::UnknownResource {
                        process: process.clone(),
                        resource: resource.clone(),
                        relation,
                    });
                }
            }
        }

        // 3. No resource is held twice
        let mut holders: FxHashMap<&ResourceId, &ProcessId> = FxHashMap::default();
        for (process, resources) in self.processes.iter().zip(&self.held) {
            for resource in resources {
                if let Some(first) = holders.insert(resource, process) {
                    return Err(ValidationError::DoubleAllocation {
                        resource: resource.clone(),
                        first: first.clone(),
                        second: process.clone(),
                    });
                }
            }
        }

        // 4. Nobody requests what it already holds
        for (i, process) in self.processes.iter().enumerate() {
            if let Some(resource) = self.wanted[i].iter().find(|r| self.held[i].contains(*r)) {
                return Err(ValidationError::RequestOfHeldResource {
                    process: process.clone(),
                    resource: resource.clone(),
                });
            }
        }

        Ok(())
    }

    /// Declared processes, in declaration order
    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    /// Size of the resource universe
    pub fn resource_count(&self) -> usize {
        self.resource_count
    }

    /// The resource universe `R1..R<n>`
    pub fn resources(&self) -> Vec<ResourceId> {
        (1..=self.resource_count).map(ResourceId::nth).collect()
    }

    /// Resources held by `process` (empty for unknown processes)
    pub fn held(&self, process: &ProcessId) -> &[ResourceId] {
        self.position(process)
            .map(|i| self.held[i].as_slice())
            .unwrap_or(&[])
    }

    /// Resources requested by `process` (empty for unknown processes)
    pub fn wanted(&self, process: &ProcessId) -> &[ResourceId] {
        self.position(process)
            .map(|i| self.wanted[i].as_slice())
            .unwrap_or(&[])
    }

    /// `(process, held resources)` pairs in declaration order
    pub fn held_entries(&self) -> impl Iterator<Item = (&ProcessId, &[ResourceId])> {
        self.processes
            .iter()
            .zip(self.held.iter().map(Vec::as_slice))
    }

    /// `(process, requested resources)` pairs in declaration order
    pub fn wanted_entries(&self) -> impl Iterator<Item = (&ProcessId, &[ResourceId])> {
        self.processes
            .iter()
            .zip(self.wanted.iter().map(Vec::as_slice))
    }

    /// The process currently holding `resource`, if any
    pub fn holder_of(&self, resource: &ResourceId) -> Option<&ProcessId> {
        self.held_entries()
            .find(|(_, resources)| resources.contains(resource))
            .map(|(process, _)| process)
    }

    /// Whether any process holds at least one resource
    pub fn has_allocations(&self) -> bool {
        self.held.iter().any(|resources| !resources.is_empty())
    }

    /// Whether any process is requesting at least one resource
    pub fn has_requests(&self) -> bool {
        self.wanted.iter().any(|resources| !resources.is_empty())
    }

    /// Whether the `held` mapping named any process, even one holding nothing
    pub fn declares_allocations(&self) -> bool {
        self.held_declared
    }

    /// Whether the `wanted` mapping named any process, even one requesting nothing
    pub fn declares_requests(&self) -> bool {
        self.wanted_declared
    }

    /// An order in which every process can be granted its requests and finish
    ///
    /// Starting from the resources nobody holds, the first process (in
    /// declaration order) whose requests are all free runs to completion and
    /// releases what it holds; the scan then restarts. Returns `None` when some
    /// process can never run.
    pub fn completion_order(&self) -> Option<Vec<ProcessId>> {
        let mut free: FxHashSet<ResourceId> = self.resources().into_iter().collect();
        for resources in &self.held {
            for resource in resources {
                free.remove(resource);
            }
        }

        let mut finished = vec![false; self.processes.len()];
        let mut order = Vec::with_capacity(self.processes.len());
        while order.len() < self.processes.len() {
            let next = (0..self.processes.len()).find(|&i| {
                !finished[i] && self.wanted[i].iter().all(|r| free.contains(r))
            })?;
            finished[next] = true;
            free.extend(self.held[next].iter().cloned());
            order.push(self.processes[next].clone());
        }
        Some(order)
    }

    fn position(&self, process: &ProcessId) -> Option<usize> {
        self.processes.iter().position(|p| p == process)
    }
}

/// Incremental construction of a [`SingleInstanceState`]
///
/// Mirrors the drag-and-drop workflow: allocations and requests are recorded
/// one at a time, and everything is validated once in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SingleInstanceBuilder {
    resource_count: usize,
    held: Vec<(ProcessId, Vec<ResourceId>)>,
    wanted: Vec<(ProcessId, Vec<ResourceId>)>,
}

impl SingleInstanceBuilder {
    /// Declare a process that neither holds nor requests anything yet
    ///
    /// The process is recorded as an empty `held` entry.
    pub fn process(mut self, process: impl Into<ProcessId>) -> Self {
        self.held.push((process.into(), Vec::new()));
        self
    }

    /// Record that `process` holds `resource`
    pub fn hold(mut self, process: impl Into<ProcessId>, resource: impl Into<ResourceId>) -> Self {
        self.held.push((process.into(), vec![resource.into()]));
        self
    }

    /// Record that `process` is blocked requesting `resource`
    pub fn want(mut self, process: impl Into<ProcessId>, resource: impl Into<ResourceId>) -> Self {
        self.wanted.push((process.into(), vec![resource.into()]));
        self
    }

    pub fn build(self) -> Result<SingleInstanceState, DetectionError> {
        SingleInstanceState::from_entries(self.held, self.wanted, self.resource_count)
    }
}
