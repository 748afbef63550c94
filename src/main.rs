use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use deadlock_lab::scenario::{Scenario, System};
use deadlock_lab::{
    BANNER, DeadlockLab, Evidence, RecoveryOutcome, Resolution, Strategy, Verdict, WaitDetail,
    Witness,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "deadlock-lab - Deadlock Detection With Step-By-Step Explanations"
)]
struct Cli {
    /// Path to the scenario file (JSON)
    scenario: PathBuf,

    /// Narrate every step of the detection algorithm
    #[arg(long)]
    trace: bool,

    /// Print the result as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write trace events to this log file ("{timestamp}" is replaced)
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Simulate recovery of an unsafe multi-instance system
    #[arg(long, value_enum)]
    recover: Option<RecoverMode>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RecoverMode {
    Preempt,
    Terminate,
}

impl From<RecoverMode> for Strategy {
    fn from(mode: RecoverMode) -> Self {
        match mode {
            RecoverMode::Preempt => Strategy::Preemption,
            RecoverMode::Terminate => Strategy::Termination,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let system = Scenario::from_path(&cli.scenario)?
        .into_system()
        .context("Invalid scenario")?;

    let mut lab = DeadlockLab::new().callback(|_| {});
    if let Some(path) = &cli.log {
        lab = lab.with_log(path);
    }
    let session = lab.start()?;

    if !cli.json {
        println!("{BANNER}");
    }

    let narrate = cli.trace && !cli.json;
    let mut details: Vec<WaitDetail> = Vec::new();
    let mut completion_order = None;
    let (verdict, recovery) = match &system {
        System::Single(state) => {
            if cli.recover.is_some() {
                eprintln!("Recovery is only simulated for multi-instance systems; ignoring --recover.");
            }
            let verdict = session.check_single_with(state, |event| {
                if narrate {
                    println!("  {event}");
                }
            });
            match &verdict {
                Verdict::Deadlock {
                    witness: Witness::Cycle(cycle),
                } => details = cycle.details(state),
                Verdict::NoDeadlock {
                    evidence: Evidence::NoCycle,
                } => completion_order = state.completion_order(),
                _ => {}
            }
            (verdict, None)
        }
        System::Multi(state) => {
            let verdict = session.check_multi_with(state, |event| {
                if narrate {
                    println!("  {event}");
                }
            })?;
            let recovery = match cli.recover {
                Some(mode) if verdict.is_deadlock() => Some(session.recover_with(
                    state,
                    mode.into(),
                    |event| {
                        if narrate {
                            println!("  {event}");
                        }
                    },
                )?),
                _ => None,
            };
            (verdict, recovery)
        }
    };

    if cli.json {
        let output = json!({
            "verdict": verdict,
            "details": details,
            "completion_order": completion_order,
            "recovery": recovery,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{verdict}");
        for detail in &details {
            println!("  {detail}");
        }
        if let Some(order) = &completion_order {
            let names: Vec<String> = order.iter().map(ToString::to_string).collect();
            println!("Safe execution sequence: {}", names.join(" -> "));
        }
        if let Some(outcome) = &recovery {
            print_recovery(outcome);
        }
    }

    deadlock_lab::logger::flush_logs()?;
    if let Some(path) = deadlock_lab::logger::get_current_log_file() {
        eprintln!("Trace written to {}", path.display());
    }
    Ok(())
}

fn print_recovery(outcome: &RecoveryOutcome) {
    println!();
    println!("Recovery by {}:", outcome.strategy);
    for step in &outcome.steps {
        println!(
            "  Step {}: {} (score {}) released [{}], available [{}]",
            step.step, step.victim, step.score, step.released, step.available
        );
    }
    match &outcome.resolution {
        Resolution::AlreadySafe(_) => println!("The system was already safe."),
        Resolution::Resolved(sequence) => {
            let names: Vec<String> = sequence.iter().map(ToString::to_string).collect();
            println!("Resolved. Safe sequence: [{}]", names.join(", "));
        }
        Resolution::Unresolved => println!("Deadlock persists. No victim left to try."),
    }
}
