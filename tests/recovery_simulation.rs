mod common;
use common::{random_multi_state, replay, start_session};
use deadlock_lab::{
    MultiInstanceState, ProcessId, RecoveryEvent, Resolution, Strategy, TraceEvent,
    detect_multi_instance_deadlock, recover,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn p(n: usize) -> ProcessId {
    ProcessId::nth(n)
}

/// Two processes each holding part of what the other needs
fn crossed_claims() -> MultiInstanceState {
    MultiInstanceState::builder()
        .resource("R1", 3)
        .resource("R2", 3)
        .process("P1", [("R1", 2), ("R2", 0)], [("R1", 2), ("R2", 2)])
        .process("P2", [("R1", 1), ("R2", 3)], [("R1", 3), ("R2", 3)])
        .build()
        .unwrap()
}

#[test]
fn test_crossed_claims_are_unsafe() {
    let verdict = detect_multi_instance_deadlock(&crossed_claims()).unwrap();
    assert_eq!(verdict.unfinished(), Some([p(1), p(2)].as_slice()));
}

#[test]
fn test_preemption_picks_the_biggest_holder() {
    let outcome = recover(&crossed_claims(), Strategy::Preemption).unwrap();

    // P1: 0 * 2 = 0 on R2 -> falls back to 2 held; P2: 1 * 2 = 2 on R1
    // Both score 2; the earlier candidate wins.
    assert_eq!(outcome.victims(), vec![p(1)]);
    let step = &outcome.steps[0];
    assert_eq!(step.score, 2);
    assert_eq!(step.released.values(), vec![2, 0]);
    assert_eq!(step.available.values(), vec![2, 0]);
    assert_eq!(outcome.resolution, Resolution::Resolved(vec![p(2), p(1)]));
}

#[test]
fn test_termination_drops_the_victim() {
    let outcome = recover(&crossed_claims(), Strategy::Termination).unwrap();
    assert_eq!(outcome.victims(), vec![p(1)]);
    assert_eq!(outcome.state.processes(), &[p(2)]);
    assert_eq!(outcome.resolution, Resolution::Resolved(vec![p(2)]));
}

#[test]
fn test_recovery_never_touches_the_input() {
    let state = crossed_claims();
    let before = state.clone();
    recover(&state, Strategy::Preemption).unwrap();
    recover(&state, Strategy::Termination).unwrap();
    assert_eq!(state, before);
}

#[test]
fn test_resolved_sequences_replay_on_final_state() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0101);
    for _ in 0..200 {
        let state = random_multi_state(&mut rng);
        for strategy in [Strategy::Preemption, Strategy::Termination] {
            let outcome = recover(&state, strategy).unwrap();
            assert!(outcome.steps.len() <= state.processes().len());
            match &outcome.resolution {
                Resolution::AlreadySafe(sequence) => {
                    assert!(outcome.steps.is_empty());
                    assert!(replay(&state, sequence));
                }
                Resolution::Resolved(sequence) => {
                    assert!(replay(&outcome.state, sequence));
                }
                Resolution::Unresolved => {
                    let verdict = detect_multi_instance_deadlock(&outcome.state).unwrap();
                    assert!(verdict.is_deadlock());
                }
            }
        }
    }
}

#[test]
fn test_session_recovery_emits_steps() {
    let harness = start_session();
    let mut victims = Vec::new();
    let outcome = harness
        .session
        .recover_with(&crossed_claims(), Strategy::Termination, |event| {
            if let TraceEvent::Recovery(RecoveryEvent::Victim { process, .. }) = event {
                victims.push(process.clone());
            }
        })
        .unwrap();
    assert!(outcome.is_resolved());
    assert_eq!(victims, outcome.victims());
}
