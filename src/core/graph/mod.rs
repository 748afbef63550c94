//! Graph module for single-instance deadlock detection
//!
//! This module contains the graphs derived from a single-instance state:
//! - Resource-allocation graph: processes and resources, allocation and request edges
//! - Wait-for graph: processes only, "who is waiting for whom"

pub mod rag;
pub mod wait_for_graph;

pub use rag::{ResourceAllocationGraph, build_rag};
pub use wait_for_graph::WaitForGraph;
