//! Banker's algorithm safety check for multi-instance systems
//!
//! The check simulates processes finishing one at a time. A process may finish
//! when its remaining need fits in the current work pool; finishing returns its
//! allocation to the pool. If every process can finish the state is safe and
//! the completion order is a safe sequence. Otherwise the processes left over
//! are reported.
//!
//! Tie-break contract: unfinished processes are scanned in declaration order,
//! the first runnable one is chosen, and the scan restarts from the beginning
//! after every completion. Recovery narration depends on which process is
//! picked at each step, so this order is part of the public behaviour.

use crate::core::error::DetectionError;
use crate::core::state::{MultiInstanceState, Need, get_need};
use crate::core::trace::{Counts, SafetyEvent};
use crate::core::types::{Evidence, ProcessId, Verdict, Witness};

/// Run the Banker's safety check on a snapshot
///
/// # Errors
/// Propagates `InconsistentStateError` from [`get_need`] when some allocation
/// exceeds its declared maximum.
pub fn detect_multi_instance_deadlock(state: &MultiInstanceState) -> Result<Verdict, DetectionError> {
    detect_multi_instance_deadlock_with(state, |_| {})
}

/// Run the Banker's safety check, reporting every step to `observer`
///
/// The caller's `available` vector is copied into the work pool and never
/// modified.
pub fn detect_multi_instance_deadlock_with<F>(
    state: &MultiInstanceState,
    mut observer: F,
) -> Result<Verdict, DetectionError>
where
    F: FnMut(SafetyEvent),
{
    let need = get_need(state)?;
    let (sequence, finish) = run_safety(state, &need, &mut observer);

    if finish.iter().all(|&done| done) {
        Ok(Verdict::NoDeadlock {
            evidence: Evidence::SafeSequence(sequence),
        })
    } else {
        Ok(Verdict::Deadlock {
            witness: Witness::Unfinished(unfinished(state, &finish)),
        })
    }
}

/// Whether a need row fits component-wise in the work pool
pub fn can_run(need: &[u32], work: &[u32]) -> bool {
    need.iter().zip(work).all(|(n, w)| n <= w)
}

fn run_safety<F>(state: &MultiInstanceState, need: &Need, observer: &mut F) -> (Vec<ProcessId>, Vec<bool>)
where
    F: FnMut(SafetyEvent),
{
    let resources = state.resources();
    let processes = state.processes();
    let mut work = state.available().to_vec();
    let mut finish = vec![false; processes.len()];
    let mut sequence = Vec::with_capacity(processes.len());

    let mut round = 0;
    while sequence.len() < processes.len() {
        round += 1;
        observer(SafetyEvent::Scan {
            round,
            work: Counts::labelled(resources, &work),
        });

        let mut progressed = false;
        for (p, process) in processes.iter().enumerate() {
            if finish[p] {
                continue;
            }

            let runnable = can_run(need.row(p), &work);
            observer(SafetyEvent::Check {
                process: process.clone(),
                need: Counts::labelled(resources, need.row(p)),
                work: Counts::labelled(resources, &work),
                runnable,
            });
            if !runnable {
                continue;
            }

            // Simulate running the process by releasing its allocated resources
            for (free, &held) in work.iter_mut().zip(state.allocation_row(p)) {
                *free += held;
            }
            finish[p] = true;
            sequence.push(process.clone());
            observer(SafetyEvent::Finish {
                process: process.clone(),
                released: Counts::labelled(resources, state.allocation_row(p)),
                work: Counts::labelled(resources, &work),
            });
            progressed = true;
            break;
        }

        if !progressed {
            observer(SafetyEvent::Stuck {
                unfinished: unfinished(state, &finish),
            });
            break;
        }
    }

    (sequence, finish)
}

fn unfinished(state: &MultiInstanceState, finish: &[bool]) -> Vec<ProcessId> {
    state
        .processes()
        .iter()
        .zip(finish)
        .filter(|&(_, &done)| !done)
        .map(|(process, _)| process.clone())
        .collect()
}
