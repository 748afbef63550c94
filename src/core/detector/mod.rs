//! Deadlock detection engines
//!
//! - [`detect_single_instance_deadlock`]: cycle search over the
//!   resource-allocation graph, for systems where every resource is a single
//!   unit. A cycle is both necessary and sufficient for deadlock.
//! - [`detect_multi_instance_deadlock`]: Banker's safety check, for systems
//!   where resources have several instances. An unsafe state may or may not
//!   deadlock; it is reported as a deadlock all the same.
//!
//! Both engines are pure: they read a validated snapshot, never modify it and
//! never perform I/O. Step-by-step observation goes through the `_with`
//! variants.

pub mod bankers;
pub mod cycle;

pub use bankers::{can_run, detect_multi_instance_deadlock, detect_multi_instance_deadlock_with};
pub use cycle::{detect_cycle, detect_cycle_with};

use crate::core::graph::build_rag;
use crate::core::state::SingleInstanceState;
use crate::core::trace::DfsEvent;
use crate::core::types::{Advisory, Evidence, Verdict, Witness};

/// Check a single-instance state for deadlock
///
/// A state whose `held` or `wanted` mapping has no entries at all is answered
/// with an advisory instead of running the search. Entries with empty lists
/// count as declared, so such states are searched and come back acyclic.
pub fn detect_single_instance_deadlock(state: &SingleInstanceState) -> Verdict {
    detect_single_instance_deadlock_with(state, |_| {})
}

/// Check a single-instance state for deadlock, reporting every DFS step
///
/// No events are produced when the state is answered with an advisory.
pub fn detect_single_instance_deadlock_with<F>(state: &SingleInstanceState, observer: F) -> Verdict
where
    F: FnMut(DfsEvent),
{
    if let Some(advisory) = advisory(state) {
        return Verdict::NoDeadlock {
            evidence: Evidence::Advisory(advisory),
        };
    }

    let graph = build_rag(state);
    match detect_cycle_with(&graph, observer) {
        Some(cycle) => Verdict::Deadlock {
            witness: Witness::Cycle(cycle),
        },
        None => Verdict::NoDeadlock {
            evidence: Evidence::NoCycle,
        },
    }
}

fn advisory(state: &SingleInstanceState) -> Option<Advisory> {
    match (state.declares_allocations(), state.declares_requests()) {
        (false, false) => Some(Advisory::NothingAllocatedOrRequested),
        (false, true) => Some(Advisory::NothingAllocated),
        (true, false) => Some(Advisory::NothingRequested),
        (true, true) => None,
    }
}
