//! Depth-first cycle search over a resource-allocation graph

use crate::core::graph::ResourceAllocationGraph;
use crate::core::trace::DfsEvent;
use crate::core::types::{Cycle, Node};
use fxhash::FxHashSet;

/// Find a cycle in the graph, if there is one
///
/// See [`detect_cycle_with`] for the traversal rules.
pub fn detect_cycle(graph: &ResourceAllocationGraph) -> Option<Cycle> {
    detect_cycle_with(graph, |_| {})
}

/// Find a cycle in the graph, reporting every step to `observer`
///
/// Depth-first search is started from each unvisited *process* node, in graph
/// order; neighbors are explored in adjacency order. A neighbor that is already
/// on the current DFS path closes a cycle and ends the search immediately, so
/// at most one cycle is reported. Which cycle that is depends on insertion
/// order; callers may only rely on it being a valid cycle.
///
/// The returned cycle follows the direction of traversal, is closed (its
/// first node is repeated at the end) and is rotated to begin at a process.
pub fn detect_cycle_with<F>(graph: &ResourceAllocationGraph, observer: F) -> Option<Cycle>
where
    F: FnMut(DfsEvent),
{
    let mut search = CycleSearch {
        graph,
        observer,
        visited: FxHashSet::default(),
        recursion_stack: FxHashSet::default(),
        path: Vec::new(),
    };

    for (start, node) in graph.nodes().iter().enumerate() {
        if !node.is_process() || search.visited.contains(&start) {
            continue;
        }
        search.emit(DfsEvent::Start { node: node.clone() });
        if let Some(cycle) = search.run_from(start) {
            return Some(cycle);
        }
    }
    None
}

struct CycleSearch<'g, F> {
    graph: &'g ResourceAllocationGraph,
    observer: F,
    /// Nodes entered by any DFS tree so far
    visited: FxHashSet<usize>,
    /// Nodes on the active DFS path
    recursion_stack: FxHashSet<usize>,
    /// Active DFS path: node and the position of its next unexplored successor
    path: Vec<(usize, usize)>,
}

impl<F: FnMut(DfsEvent)> CycleSearch<'_, F> {
    fn node(&self, i: usize) -> Node {
        self.graph.nodes()[i].clone()
    }

    fn emit(&mut self, event: DfsEvent) {
        (self.observer)(event);
    }

    fn enter(&mut self, i: usize) {
        let event = DfsEvent::Visit { node: self.node(i) };
        self.emit(event);
        self.visited.insert(i);
        self.recursion_stack.insert(i);
        self.path.push((i, 0));
    }

    fn run_from(&mut self, start: usize) -> Option<Cycle> {
        self.enter(start);

        while let Some(top) = self.path.last_mut() {
            let current = top.0;
            let successors = self.graph.successors(current);

            if top.1 == successors.len() {
                // Every edge explored: leave the path, stay visited
                self.path.pop();
                self.recursion_stack.remove(&current);
                let event = DfsEvent::Backtrack {
                    node: self.node(current),
                };
                self.emit(event);
                continue;
            }

            let next = successors[top.1];
            top.1 += 1;
            let event = DfsEvent::CheckEdge {
                from: self.node(current),
                to: self.node(next),
            };
            self.emit(event);

            if !self.visited.contains(&next) {
                self.enter(next);
            } else if self.recursion_stack.contains(&next) {
                let cycle = self.close_cycle(next);
                self.emit(DfsEvent::CycleFound {
                    cycle: cycle.clone(),
                });
                return Some(cycle);
            }
        }
        None
    }

    /// Build the cycle `next -> ... -> current -> next` from the active path
    fn close_cycle(&self, next: usize) -> Cycle {
        let from = self
            .path
            .iter()
            .position(|&(i, _)| i == next)
            .unwrap_or(0);
        let open: Vec<Node> = self.path[from..]
            .iter()
            .map(|&(i, _)| self.node(i))
            .collect();
        Cycle::new(rotate_to_process(open))
    }
}

/// Rotate an open cycle so it starts at its first process, then close it
fn rotate_to_process(mut open: Vec<Node>) -> Vec<Node> {
    let shift = open.iter().position(Node::is_process).unwrap_or(0);
    open.rotate_left(shift);
    if let Some(first) = open.first().cloned() {
        open.push(first);
    }
    open
}
