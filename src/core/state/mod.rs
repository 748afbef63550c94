//! System state snapshots fed to the detection engines
//!
//! - Single-instance state: who holds and who wants each one-unit resource
//! - Multi-instance state: allocation, max, available and total instance counts

pub mod multi;
pub mod single;

pub use multi::{
    MultiInstanceBuilder, MultiInstanceState, Need, ProcessMatrix, ResourceCounts, get_need,
};
pub use single::{SingleInstanceBuilder, SingleInstanceState};
