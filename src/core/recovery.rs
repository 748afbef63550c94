//! Recovery simulation for unsafe multi-instance states
//!
//! Starting from an unsafe snapshot, victims are chosen one at a time and their
//! instances returned to the pool until the Banker's check passes. Two
//! strategies are supported:
//!
//! - **Preemption**: the victim's allocation is seized; the victim stays in the
//!   system holding nothing, so its need grows back to its declared maximum.
//! - **Termination**: the victim is removed from the system altogether.
//!
//! Every step works on a fresh snapshot; the caller's state is never touched.

use crate::core::detector::detect_multi_instance_deadlock_with;
use crate::core::error::DetectionError;
use crate::core::state::{MultiInstanceState, Need, get_need};
use crate::core::trace::{Counts, RecoveryEvent, TraceEvent};
use crate::core::types::{ProcessId, Verdict};
use fxhash::FxHashSet;
use serde::Serialize;
use std::fmt;

/// How victims are dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Preemption,
    Termination,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Preemption => f.write_str("resource preemption"),
            Strategy::Termination => f.write_str("process termination"),
        }
    }
}

/// One victim and what happened after it was dealt with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryStep {
    /// 1-based step number
    pub step: usize,
    pub victim: ProcessId,
    /// Victim selection score
    pub score: u64,
    /// Instances taken back from the victim
    pub released: Counts,
    /// Free instances after the release
    pub available: Counts,
    /// Safety verdict of the new snapshot; `None` when the victim held nothing
    /// and the snapshot did not change
    pub verdict: Option<Verdict>,
}

/// How a recovery run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", content = "sequence", rename_all = "snake_case")]
pub enum Resolution {
    /// The state was safe to begin with
    AlreadySafe(Vec<ProcessId>),
    /// The last snapshot is safe with this sequence
    Resolved(Vec<ProcessId>),
    /// Out of candidates or out of steps
    Unresolved,
}

/// Full record of a recovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryOutcome {
    pub strategy: Strategy,
    pub steps: Vec<RecoveryStep>,
    pub resolution: Resolution,
    /// Snapshot after the last step
    pub state: MultiInstanceState,
}

impl RecoveryOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.resolution, Resolution::Unresolved)
    }

    /// Victims in the order they were chosen
    pub fn victims(&self) -> Vec<ProcessId> {
        self.steps.iter().map(|s| s.victim.clone()).collect()
    }
}

/// Simulate recovery of `state` with the given strategy
///
/// # Errors
/// Propagates `InconsistentStateError` when some allocation exceeds its maximum.
pub fn recover(state: &MultiInstanceState, strategy: Strategy) -> Result<RecoveryOutcome, DetectionError> {
    recover_with(state, strategy, |_| {})
}

/// Simulate recovery, reporting recovery steps and every safety check
pub fn recover_with<F>(
    state: &MultiInstanceState,
    strategy: Strategy,
    mut observer: F,
) -> Result<RecoveryOutcome, DetectionError>
where
    F: FnMut(TraceEvent),
{
    let initial = detect_multi_instance_deadlock_with(state, |e| observer(e.into()))?;
    if let Some(sequence) = initial.safe_sequence() {
        return Ok(RecoveryOutcome {
            strategy,
            steps: Vec::new(),
            resolution: Resolution::AlreadySafe(sequence.to_vec()),
            state: state.clone(),
        });
    }

    let mut current = state.clone();
    let mut steps = Vec::new();
    let mut preempted: FxHashSet<ProcessId> = FxHashSet::default();
    let mut resolution = Resolution::Unresolved;

    for step in 1..=state.processes().len() {
        let need = get_need(&current)?;
        let candidates: Vec<usize> = match strategy {
            Strategy::Preemption => (0..current.processes().len())
                .filter(|&i| !preempted.contains(&current.processes()[i]) && need.is_outstanding(i))
                .collect(),
            Strategy::Termination => (0..current.processes().len()).collect(),
        };
        let Some((victim, score)) = select_victim(&current, &need, &candidates) else {
            break;
        };

        let process = current.processes()[victim].clone();
        observer(
            RecoveryEvent::Victim {
                step,
                process: process.clone(),
                score,
            }
            .into(),
        );

        let released = Counts::labelled(current.resources(), current.allocation_row(victim));
        let holds_nothing = current.allocation_row(victim).iter().all(|&n| n == 0);

        if holds_nothing && strategy == Strategy::Preemption {
            observer(RecoveryEvent::NothingToRelease { process: process.clone() }.into());
            preempted.insert(process.clone());
            steps.push(RecoveryStep {
                step,
                victim: process,
                score,
                released,
                available: Counts::labelled(current.resources(), current.available()),
                verdict: None,
            });
            continue;
        }

        current = match strategy {
            Strategy::Preemption => {
                preempted.insert(process.clone());
                current.with_preempted(victim)
            }
            Strategy::Termination => current.without_process(victim),
        };
        let available = Counts::labelled(current.resources(), current.available());
        observer(
            RecoveryEvent::Released {
                process: process.clone(),
                released: released.clone(),
                available: available.clone(),
            }
            .into(),
        );

        let verdict = detect_multi_instance_deadlock_with(&current, |e| observer(e.into()))?;
        let safe = !verdict.is_deadlock();
        observer(RecoveryEvent::Checked { step, safe }.into());

        let sequence = verdict.safe_sequence().map(<[ProcessId]>::to_vec);
        steps.push(RecoveryStep {
            step,
            victim: process,
            score,
            released,
            available,
            verdict: Some(verdict),
        });
        if let Some(sequence) = sequence {
            resolution = Resolution::Resolved(sequence);
            break;
        }
    }

    Ok(RecoveryOutcome {
        strategy,
        steps,
        resolution,
        state: current,
    })
}

/// Pick the candidate holding the most of what others are short of
///
/// A candidate scores `allocation * (need - available)` summed over every
/// resource it still needs more of than is free. A zero score falls back to
/// the candidate's total allocation. The highest score wins; the earliest
/// candidate wins ties.
pub fn select_victim(
    state: &MultiInstanceState,
    need: &Need,
    candidates: &[usize],
) -> Option<(usize, u64)> {
    let available = state.available();
    let mut best: Option<(usize, u64)> = None;

    for &p in candidates {
        let allocation = state.allocation_row(p);
        let shortfall: u64 = need
            .row(p)
            .iter()
            .zip(available)
            .zip(allocation)
            .filter(|&((&n, &a), _)| n > 0 && a < n)
            .map(|((&n, &a), &held)| u64::from(held) * u64::from(n - a))
            .fold(0u64, u64::saturating_add);
        let score = if shortfall > 0 {
            shortfall
        } else {
            allocation.iter().map(|&n| u64::from(n)).sum()
        };

        if best.is_none_or(|(_, top)| score > top) {
            best = Some((p, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::trace::SafetyEvent;

    fn p(n: usize) -> ProcessId {
        ProcessId::nth(n)
    }

    /// Every process holds one instance and needs one more; nothing is free
    fn circular_wait() -> MultiInstanceState {
        MultiInstanceState::builder()
            .resource("R1", 3)
            .process("P1", [("R1", 1)], [("R1", 2)])
            .process("P2", [("R1", 1)], [("R1", 2)])
            .process("P3", [("R1", 1)], [("R1", 2)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_safe_state_needs_no_recovery() {
        let state = MultiInstanceState::builder()
            .resource("R1", 2)
            .process("P1", [("R1", 1)], [("R1", 2)])
            .build()
            .unwrap();
        let outcome = recover(&state, Strategy::Preemption).unwrap();
        assert_eq!(outcome.resolution, Resolution::AlreadySafe(vec![p(1)]));
        assert!(outcome.steps.is_empty());
    }

    #[test]
    fn test_preemption_resolves_circular_wait() {
        let outcome = recover(&circular_wait(), Strategy::Preemption).unwrap();

        // All scores tie at 1; the first candidate is picked
        assert_eq!(outcome.victims(), vec![p(1)]);
        assert_eq!(outcome.steps[0].available.values(), vec![1]);
        // P1 stays in the system and now needs its full maximum
        assert_eq!(outcome.state.processes().len(), 3);
        assert_eq!(outcome.state.allocation_row(0), &[0]);
        // P2 finishes first, after which P1's full maximum fits
        assert_eq!(outcome.resolution, Resolution::Resolved(vec![p(2), p(1), p(3)]));
    }

    #[test]
    fn test_termination_removes_victim() {
        let outcome = recover(&circular_wait(), Strategy::Termination).unwrap();
        assert_eq!(outcome.victims(), vec![p(1)]);
        assert_eq!(outcome.state.processes(), &[p(2), p(3)]);
        assert_eq!(outcome.resolution, Resolution::Resolved(vec![p(2), p(3)]));
    }

    #[test]
    fn test_victim_score_prefers_scarce_holders() {
        let state = MultiInstanceState::builder()
            .resource("R1", 4)
            .resource("R2", 2)
            .process("P1", [("R1", 1), ("R2", 0)], [("R1", 2), ("R2", 0)])
            .process("P2", [("R1", 3), ("R2", 2)], [("R1", 4), ("R2", 2)])
            .build()
            .unwrap();
        let need = get_need(&state).unwrap();
        // P1: 1 * (1 - 0) = 1; P2: 3 * (1 - 0) = 3
        assert_eq!(select_victim(&state, &need, &[0, 1]), Some((1, 3)));
        assert_eq!(select_victim(&state, &need, &[]), None);
    }

    #[test]
    fn test_zero_score_falls_back_to_total_allocation() {
        let state = MultiInstanceState::builder()
            .resource("R1", 5)
            .process("P1", [("R1", 2)], [("R1", 3)])
            .build()
            .unwrap();
        let need = get_need(&state).unwrap();
        // need 1 <= available 3, no shortfall
        assert_eq!(select_victim(&state, &need, &[0]), Some((0, 2)));
    }

    #[test]
    fn test_unresolvable_state_stops_after_process_count() {
        // P1's maximum exceeds the total; no amount of preemption helps
        let state = MultiInstanceState::builder()
            .resource("R1", 2)
            .process("P1", [("R1", 1)], [("R1", 3)])
            .process("P2", [("R1", 1)], [("R1", 3)])
            .build()
            .unwrap();
        let outcome = recover(&state, Strategy::Preemption).unwrap();
        assert_eq!(outcome.resolution, Resolution::Unresolved);
        assert!(!outcome.is_resolved());
        assert!(outcome.steps.len() <= 2);
    }

    #[test]
    fn test_preemption_near_the_instance_limit() {
        let state = MultiInstanceState::builder()
            .resource("R1", 3)
            .process("P1", [("R1", 1)], [("R1", u32::MAX)])
            .process("P2", [("R1", 2)], [("R1", u32::MAX)])
            .available([("R1", u32::MAX - 3)])
            .build()
            .unwrap();
        let outcome = recover(&state, Strategy::Preemption).unwrap();

        // P1: 1 * 2 short, P2: 2 * 1 short; the tie goes to P1
        assert_eq!(outcome.victims(), vec![p(1)]);
        assert_eq!(outcome.steps[0].available.values(), vec![u32::MAX - 2]);
        assert_eq!(outcome.resolution, Resolution::Resolved(vec![p(2), p(1)]));
    }

    #[test]
    fn test_observer_sees_recovery_and_safety_events() {
        let mut events = Vec::new();
        recover_with(&circular_wait(), Strategy::Termination, |e| events.push(e)).unwrap();

        assert!(matches!(
            events.first(),
            Some(TraceEvent::Safety(SafetyEvent::Scan { round: 1, .. }))
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            TraceEvent::Recovery(RecoveryEvent::Victim { step: 1, .. })
        )));
        assert_eq!(
            events.last(),
            Some(&TraceEvent::Recovery(RecoveryEvent::Checked { step: 1, safe: true }))
        );
    }
}
