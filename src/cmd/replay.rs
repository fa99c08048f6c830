//! Offline replay command (`crisis-relay replay`).
//!
//! Drives a recorded run through the same controller the server uses, so
//! the printed events and decisions match what the dashboard would show.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use crisis_common::{DecisionLedger, RunPhase};
use crisis_relay::config::{CliOverrides, CrisisConfig};
use crisis_relay::engine::ScriptedEngine;
use crisis_relay::runner::{RunController, RunOutcome};
use crisis_relay::state::RunState;

pub async fn cmd_replay(
    project_dir: PathBuf,
    config_file: Option<&Path>,
    trace: &Path,
    json: bool,
) -> Result<()> {
    let config = CrisisConfig::load(project_dir, config_file, &CliOverrides::default())?;
    let engine = ScriptedEngine::load(trace)?;
    let controller = RunController::new(
        Arc::new(RunState::default()),
        Arc::new(engine),
        config.transducer().clone(),
    );

    let outcome = controller.run().await?;

    if json {
        let value = serde_json::json!({
            "run_id": outcome.run_id,
            "status": outcome.status.status,
            "final_output": outcome.status.final_output,
            "events": outcome.events,
            "decisions": outcome.decisions,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.status.status == RunPhase::Error {
        bail!(
            "Replayed run failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!();
    println!("Events");
    println!("======");
    for event in &outcome.events {
        println!(
            "{:>4}  {:<32} {:<15} {}",
            event.id,
            event.speaker.display_name(),
            event.kind.as_str(),
            event.message.replace('\n', " ")
        );
    }
    println!();
    print_decisions(&outcome.decisions);
    println!("Status: {}", outcome.status.status.as_str());
    if let Some(final_output) = &outcome.status.final_output {
        println!("Final output: {}", final_output);
    }
}

fn print_decisions(ledger: &DecisionLedger) {
    println!("Decisions");
    println!("=========");
    match &ledger.monitor_summary {
        Some(m) => println!(
            "  monitor:        {} flagged, {} engagement",
            m.flagged_count, m.total_engagement
        ),
        None => println!("  monitor:        -"),
    }
    match &ledger.severity {
        Some(s) => println!("  severity:       {} ({})", s.level.as_str(), s.reasoning),
        None => println!("  severity:       -"),
    }
    match &ledger.strategy {
        Some(s) => println!(
            "  strategy:       action={} tone={} escalate={}",
            s.action, s.tone, s.escalate
        ),
        None => println!("  strategy:       -"),
    }
    match &ledger.recommendation {
        Some(r) => println!("  recommendation: {} ({})", r.status.as_str(), r.reason),
        None => println!("  recommendation: -"),
    }
    println!();
}
