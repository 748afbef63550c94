use deadlock_lab::{
    DeadlockInfo, DeadlockLab, MultiInstanceState, ProcessId, ResourceId, Session,
    SingleInstanceState, get_need,
};
use rand::Rng;
use std::sync::mpsc;

#[allow(dead_code)]
pub struct SessionHarness {
    pub session: Session,
    pub rx: mpsc::Receiver<DeadlockInfo>,
}

#[allow(dead_code)]
pub fn start_session() -> SessionHarness {
    let (tx, rx) = mpsc::channel::<DeadlockInfo>();
    let session = DeadlockLab::new()
        .callback(move |info| {
            let _ = tx.send(info);
        })
        .start()
        .expect("Failed to start session");
    SessionHarness { session, rx }
}

#[allow(dead_code)]
pub fn expect_deadlock(h: &SessionHarness) -> DeadlockInfo {
    h.rx.try_recv().expect("No deadlock was reported")
}

#[allow(dead_code)]
pub fn assert_no_deadlock(h: &SessionHarness) {
    assert!(h.rx.try_recv().is_err(), "Unexpected deadlock reported");
}

/// Random valid single-instance state with up to 6 processes and 6 resources
#[allow(dead_code)]
pub fn random_single_state<R: Rng>(rng: &mut R) -> SingleInstanceState {
    let processes = rng.random_range(1..=6);
    let resources = rng.random_range(1..=6);

    let mut holder: Vec<Option<usize>> = vec![None; resources + 1];
    let mut builder = SingleInstanceState::builder(resources);
    for p in 1..=processes {
        builder = builder.process(ProcessId::nth(p));
    }
    for r in 1..=resources {
        if rng.random_bool(0.7) {
            let p = rng.random_range(1..=processes);
            holder[r] = Some(p);
            builder = builder.hold(ProcessId::nth(p), ResourceId::nth(r));
        }
    }
    for p in 1..=processes {
        for r in 1..=resources {
            if holder[r] != Some(p) && rng.random_bool(0.3) {
                builder = builder.want(ProcessId::nth(p), ResourceId::nth(r));
            }
        }
    }
    builder.build().expect("generated state should be valid")
}

/// Random multi-instance state whose allocations respect both max and total
#[allow(dead_code)]
pub fn random_multi_state<R: Rng>(rng: &mut R) -> MultiInstanceState {
    let processes = rng.random_range(1..=5);
    let resources = rng.random_range(1..=3);
    let totals: Vec<u32> = (0..resources).map(|_| rng.random_range(1..=6)).collect();

    let mut remaining = totals.clone();
    let mut builder = MultiInstanceState::builder();
    for (r, &total) in totals.iter().enumerate() {
        builder = builder.resource(ResourceId::nth(r + 1), total);
    }
    for p in 1..=processes {
        let mut allocation = Vec::with_capacity(resources);
        let mut max = Vec::with_capacity(resources);
        for r in 0..resources {
            let held = rng.random_range(0..=remaining[r]);
            remaining[r] -= held;
            allocation.push((ResourceId::nth(r + 1), held));
            max.push((ResourceId::nth(r + 1), held + rng.random_range(0..=totals[r])));
        }
        builder = builder.process(ProcessId::nth(p), allocation, max);
    }
    builder.build().expect("generated state should be valid")
}

/// Whether the resource-allocation relation of `state` is cyclic
///
/// Computed from a transitive closure over processes and resources, without
/// using the crate's graph types.
#[allow(dead_code)]
pub fn has_cycle_by_closure(state: &SingleInstanceState) -> bool {
    let processes = state.processes();
    let resources = state.resources();
    let n = processes.len() + resources.len();
    let process_slot = |p: &ProcessId| processes.iter().position(|x| x == p).unwrap();
    let resource_slot =
        |r: &ResourceId| processes.len() + resources.iter().position(|x| x == r).unwrap();

    let mut reach = vec![vec![false; n]; n];
    for (p, held) in state.held_entries() {
        for r in held {
            reach[resource_slot(r)][process_slot(p)] = true;
        }
    }
    for (p, wanted) in state.wanted_entries() {
        for r in wanted {
            reach[process_slot(p)][resource_slot(r)] = true;
        }
    }
    for k in 0..n {
        for i in 0..n {
            if reach[i][k] {
                for j in 0..n {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
    }
    (0..n).any(|i| reach[i][i])
}

/// Run `sequence` against the state and report whether every step was allowed
#[allow(dead_code)]
pub fn replay(state: &MultiInstanceState, sequence: &[ProcessId]) -> bool {
    let need = get_need(state).unwrap();
    let mut work = state.available().to_vec();
    for process in sequence {
        let p = state.process_index(process).unwrap();
        if need.row(p).iter().zip(&work).any(|(n, w)| n > w) {
            return false;
        }
        for (w, a) in work.iter_mut().zip(state.allocation_row(p)) {
            *w += a;
        }
    }
    true
}

/// Whether any ordering of all processes can run to completion
#[allow(dead_code)]
pub fn brute_force_safe(state: &MultiInstanceState) -> bool {
    let mut order: Vec<ProcessId> = state.processes().to_vec();
    permutations(&mut order, 0, &mut |candidate| replay(state, candidate))
}

#[allow(dead_code)]
fn permutations<F>(items: &mut Vec<ProcessId>, k: usize, check: &mut F) -> bool
where
    F: FnMut(&[ProcessId]) -> bool,
{
    if k == items.len() {
        return check(items);
    }
    for i in k..items.len() {
        items.swap(k, i);
        if permutations(items, k + 1, check) {
            items.swap(k, i);
            return true;
        }
        items.swap(k, i);
    }
    false
}

/// Which processes can finish under at least one ordering
///
/// A set of processes is completable when one of its members can run after all
/// the others have finished. Every subset is checked in increasing bitmask
/// order, so the crate's scan order plays no part in the answer.
#[allow(dead_code)]
pub fn finishable_by_subsets(state: &MultiInstanceState) -> Vec<bool> {
    let need = get_need(state).unwrap();
    let n = state.processes().len();
    let mut completable = vec![false; 1 << n];
    completable[0] = true;
    let mut finishable = vec![false; n];

    for set in 1usize..1 << n {
        for p in (0..n).filter(|&p| set & (1 << p) != 0) {
            let rest = set & !(1 << p);
            if !completable[rest] {
                continue;
            }
            let fits = (0..state.resources().len()).all(|r| {
                let released: u64 = (0..n)
                    .filter(|&q| rest & (1 << q) != 0)
                    .map(|q| u64::from(state.allocation_row(q)[r]))
                    .sum();
                u64::from(need.row(p)[r]) <= u64::from(state.available()[r]) + released
            });
            if fits {
                completable[set] = true;
                finishable[p] = true;
            }
        }
    }
    finishable
}
