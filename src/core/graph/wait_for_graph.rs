//! Wait-For Graph derived from a single-instance state
//!
//! The wait-for graph (WFG) collapses the resource-allocation graph onto
//! processes only: an edge `A -> B` means process A requests a resource that
//! process B holds. With single-instance resources the WFG has a cycle exactly
//! when the RAG does, and it is the form in which deadlocks are reported to the
//! user ("P1 waits for P2 waits for P1").
//!
//! # How it works
//!
//! The graph keeps two mappings:
//! 1. *Forward graph (`edges`)*: `A -> [B]`, the processes A is waiting for.
//! 2. *Reverse graph (`incoming_edges`)*: `B -> [A]`, the processes waiting for B.
//!
//! Adjacency lists keep insertion order, so a graph derived from the same state
//! is always traversed the same way.

use crate::core::state::SingleInstanceState;
use crate::core::types::ProcessId;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Represents a directed graph of process wait relationships
#[derive(Debug, Clone, Default)]
pub struct WaitForGraph {
    /// Processes in the order they were first seen
    processes: Vec<ProcessId>,

    /// Maps a process to all the processes it is waiting for (outgoing edges)
    edges: FxHashMap<ProcessId, Vec<ProcessId>>,

    /// Maps a process to all processes waiting for it (incoming edges)
    incoming_edges: FxHashMap<ProcessId, Vec<ProcessId>>,
}

impl WaitForGraph {
    /// Create a new empty wait-for graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the wait-for graph of a single-instance state
    ///
    /// Every declared process becomes a node. For each requested resource held
    /// by another process, an edge requester -> holder is added.
    pub fn from_state(state: &SingleInstanceState) -> Self {
        let mut graph = Self::new();
        for process in state.processes() {
            graph.add_process(process.clone());
        }
        for (waiter, wanted) in state.wanted_entries() {
            for resource in wanted {
                if let Some(holder) = state.holder_of(resource)
                    && holder != waiter
                {
                    graph.add_edge(waiter.clone(), holder.clone());
                }
            }
        }
        graph
    }

    fn add_process(&mut self, process: ProcessId) {
        if !self.edges.contains_key(&process) {
            self.edges.insert(process.clone(), Vec::new());
            self.incoming_edges.insert(process.clone(), Vec::new());
            self.processes.push(process);
        }
    }

    /// Add a directed edge: `from` waits for `to`
    ///
    /// The edge is always recorded. If it closes a cycle, the cycle is returned
    /// as `[from, to, ..., from]`.
    pub fn add_edge(&mut self, from: ProcessId, to: ProcessId) -> Option<Vec<ProcessId>> {
        self.add_process(from.clone());
        self.add_process(to.clone());

        // Edge already known: nothing changes
        if self.edges[&from].contains(&to) {
            return None;
        }

        // A cycle is created if there is already a path from 'to' to 'from'
        let cycle = self.find_path(&to, &from).map(|path| {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(from.clone());
            cycle.extend(path);
            cycle
        });

        if let Some(targets) = self.edges.get_mut(&from) {
            targets.push(to.clone());
        }
        if let Some(waiters) = self.incoming_edges.get_mut(&to) {
            waiters.push(from);
        }

        cycle
    }

    /// Processes in the graph, in the order they were first seen
    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    /// Processes that `process` is waiting for
    pub fn waits_for(&self, process: &ProcessId) -> &[ProcessId] {
        self.edges.get(process).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Processes waiting for `process`
    pub fn waiters_of(&self, process: &ProcessId) -> &[ProcessId] {
        self.incoming_edges
            .get(process)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(waiter, holder)` edge, grouped by waiter in process order
    pub fn edges(&self) -> Vec<(ProcessId, ProcessId)> {
        self.processes
            .iter()
            .flat_map(|from| {
                self.waits_for(from)
                    .iter()
                    .map(move |to| (from.clone(), to.clone()))
            })
            .collect()
    }

    /// Find a cycle, as a closed list `[A, B, ..., A]`
    ///
    /// Processes are tried in order; the first one that can reach itself again
    /// yields the cycle.
    pub fn find_cycle(&self) -> Option<Vec<ProcessId>> {
        for start in &self.processes {
            for next in self.waits_for(start) {
                if let Some(path) = self.find_path(next, start) {
                    let mut cycle = Vec::with_capacity(path.len() + 1);
                    cycle.push(start.clone());
                    cycle.extend(path);
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Find a path from `start` to `target` using BFS
    fn find_path(&self, start: &ProcessId, target: &ProcessId) -> Option<Vec<ProcessId>> {
        if start == target {
            return Some(vec![start.clone()]);
        }

        let mut queue = VecDeque::new();
        let mut visited: FxHashSet<&ProcessId> = FxHashSet::default();
        let mut parent: FxHashMap<&ProcessId, &ProcessId> = FxHashMap::default();

        queue.push_back(start);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.waits_for(current) {
                if !visited.insert(neighbor) {
                    continue;
                }
                parent.insert(neighbor, current);

                if neighbor == target {
                    // Reconstruct path
                    let mut path = vec![target.clone()];
                    let mut node = target;
                    while let Some(&prev) = parent.get(node) {
                        path.push(prev.clone());
                        node = prev;
                    }
                    path.reverse();
                    return Some(path);
                }

                queue.push_back(neighbor);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: usize) -> ProcessId {
        ProcessId::nth(n)
    }

    #[test]
    fn test_two_process_cycle_from_state() {
        let state = SingleInstanceState::builder(2)
            .hold("P1", "R1")
            .hold("P2", "R2")
            .want("P1", "R2")
            .want("P2", "R1")
            .build()
            .unwrap();
        let wfg = WaitForGraph::from_state(&state);

        assert_eq!(wfg.edges(), vec![(p(1), p(2)), (p(2), p(1))]);
        assert_eq!(wfg.waiters_of(&p(1)), &[p(2)]);
        assert_eq!(wfg.find_cycle(), Some(vec![p(1), p(2), p(1)]));
    }

    #[test]
    fn test_unheld_requests_add_no_edges() {
        let state = SingleInstanceState::builder(2)
            .hold("P1", "R1")
            .want("P2", "R2")
            .build()
            .unwrap();
        let wfg = WaitForGraph::from_state(&state);
        assert!(wfg.edges().is_empty());
        assert_eq!(wfg.find_cycle(), None);
    }

    #[test]
    fn test_add_edge_reports_closing_cycle() {
        let mut wfg = WaitForGraph::new();
        assert!(wfg.add_edge(p(1), p(2)).is_none());
        assert!(wfg.add_edge(p(2), p(3)).is_none());
        assert_eq!(wfg.add_edge(p(3), p(1)), Some(vec![p(3), p(1), p(2), p(3)]));
        // The edge was recorded anyway
        assert_eq!(wfg.waits_for(&p(3)), &[p(1)]);
    }

    #[test]
    fn test_no_false_cycles() {
        let mut wfg = WaitForGraph::new();
        assert!(wfg.add_edge(p(1), p(2)).is_none());
        assert!(wfg.add_edge(p(2), p(3)).is_none());
        assert!(wfg.add_edge(p(1), p(3)).is_none());
        assert_eq!(wfg.find_cycle(), None);
    }
}
