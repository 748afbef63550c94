//! Resource-Allocation Graph for single-instance systems
//!
//! Nodes are processes and resources. An allocation edge `R -> P` means P holds
//! R; a request edge `P -> R` means P is blocked waiting for R. With one
//! instance per resource, a directed cycle in this graph is exactly a deadlock.
//!
//! Nodes are stored in insertion order and edges in adjacency lists, so a graph
//! built from the same state always iterates the same way.

use crate::core::state::SingleInstanceState;
use crate::core::types::{Node, ProcessId, ResourceId};
use fxhash::FxHashMap;
use serde::{Serialize, Serializer};

/// A directed process/resource graph with insertion-ordered nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAllocationGraph {
    nodes: Vec<Node>,
    index: FxHashMap<Node, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl ResourceAllocationGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it is not present yet
    ///
    /// # Returns
    /// The node's position in iteration order
    pub fn add_node(&mut self, node: Node) -> usize {
        if let Some(&i) = self.index.get(&node) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(node.clone(), i);
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        i
    }

    /// Add a directed edge, inserting missing endpoints first
    ///
    /// Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: Node, to: Node) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.adjacency[from].contains(&to) {
            self.adjacency[from].push(to);
        }
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.index.contains_key(node)
    }

    /// Outgoing neighbors of `node`, in insertion order
    pub fn neighbors<'a>(&'a self, node: &Node) -> impl Iterator<Item = &'a Node> + use<'a> {
        let targets = self
            .index
            .get(node)
            .map(|&i| self.adjacency[i].as_slice())
            .unwrap_or(&[]);
        targets.iter().map(move |&j| &self.nodes[j])
    }

    pub fn has_edge(&self, from: &Node, to: &Node) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&f), Some(&t)) => self.adjacency[f].contains(&t),
            _ => false,
        }
    }

    /// Every edge as a `(from, to)` pair, grouped by source node
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.adjacency.iter().enumerate().flat_map(move |(i, targets)| {
            targets.iter().map(move |&j| (&self.nodes[i], &self.nodes[j]))
        })
    }

    /// Index-level view used by the traversal algorithms
    pub(crate) fn successors(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }
}

#[derive(Serialize)]
struct GraphLink<'a> {
    source: &'a Node,
    target: &'a Node,
    #[serde(rename = "type")]
    link_type: &'static str,
}

#[derive(Serialize)]
struct GraphSnapshot<'a> {
    nodes: &'a [Node],
    links: Vec<GraphLink<'a>>,
}

impl Serialize for ResourceAllocationGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let links = self
            .edges()
            .map(|(source, target)| GraphLink {
                source,
                target,
                link_type: if source.is_resource() {
                    "allocation"
                } else {
                    "request"
                },
            })
            .collect();
        GraphSnapshot {
            nodes: &self.nodes,
            links,
        }
        .serialize(serializer)
    }
}

/// Convert a single-instance state into its resource-allocation graph
///
/// Every declared process gets a node (and so an adjacency entry) even when it
/// has no edges, followed by `R1..R<n>`. Allocation edges `R -> P` are added
/// for each held resource and request edges `P -> R` for each wanted one. The
/// state is not modified.
pub fn build_rag(state: &SingleInstanceState) -> ResourceAllocationGraph {
    let mut graph = ResourceAllocationGraph::new();
    for process in state.processes() {
        graph.add_node(Node::Process(process.clone()));
    }
    for resource in state.resources() {
        graph.add_node(Node::Resource(resource));
    }

    // Allocation edges: Resource -> Process
    for (process, resources) in state.held_entries() {
        for resource in resources {
            graph.add_edge(resource_node(resource), process_node(process));
        }
    }

    // Request edges: Process -> Resource
    for (process, resources) in state.wanted_entries() {
        for resource in resources {
            graph.add_edge(process_node(process), resource_node(resource));
        }
    }

    graph
}

fn process_node(process: &ProcessId) -> Node {
    Node::Process(process.clone())
}

fn resource_node(resource: &ResourceId) -> Node {
    Node::Resource(resource.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rag_edges() {
        let state = SingleInstanceState::builder(2)
            .hold("P1", "R1")
            .hold("P2", "R2")
            .want("P1", "R2")
            .build()
            .unwrap();
        let rag = build_rag(&state);

        assert_eq!(rag.node_count(), 4);
        assert_eq!(rag.edge_count(), 3);
        assert!(rag.has_edge(&Node::resource("R1"), &Node::process("P1")));
        assert!(rag.has_edge(&Node::resource("R2"), &Node::process("P2")));
        assert!(rag.has_edge(&Node::process("P1"), &Node::resource("R2")));
        assert!(!rag.has_edge(&Node::process("P2"), &Node::resource("R1")));
    }

    #[test]
    fn test_every_process_has_a_node() {
        let state = SingleInstanceState::builder(1)
            .process("P1")
            .want("P2", "R1")
            .build()
            .unwrap();
        let rag = build_rag(&state);
        assert_eq!(
            rag.nodes(),
            &[Node::process("P1"), Node::process("P2"), Node::resource("R1")]
        );
        assert_eq!(rag.neighbors(&Node::process("P1")).count(), 0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let state = SingleInstanceState::builder(3)
            .hold("P1", "R1")
            .hold("P2", "R3")
            .want("P1", "R3")
            .want("P2", "R2")
            .build()
            .unwrap();
        assert_eq!(build_rag(&state), build_rag(&state));
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut graph = ResourceAllocationGraph::new();
        graph.add_edge(Node::process("P1"), Node::resource("R1"));
        graph.add_edge(Node::process("P1"), Node::resource("R1"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_serialized_links_carry_edge_kind() {
        let state = SingleInstanceState::builder(1)
            .hold("P1", "R1")
            .want("P2", "R1")
            .build()
            .unwrap();
        let json = serde_json::to_value(build_rag(&state)).unwrap();
        let links = json["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l["type"] == "allocation"));
        assert!(links.iter().any(|l| l["type"] == "request"));
    }
}
