//! Post-run reconciliation.
//!
//! After the engine returns, its per-step outputs are the authoritative
//! record of each role's answer. Each step is mapped back to a role and
//! re-parsed; the resulting updates are applied after any inline ones, so
//! the last parse for a slot wins.

use crisis_common::Speaker;

use super::{CRITICAL_REGEX, LOW_REGEX, LedgerUpdate, MODERATE_REGEX, STATUS_REGEX, extract};
use crate::engine::StepOutput;
use crate::transducer::SpeakerTable;

/// Known task names, as the crew definition spells them.
pub fn speaker_for_step_name(name: &str) -> Option<Speaker> {
    match name.trim().to_lowercase().as_str() {
        "monitor_task" | "monitor" => Some(Speaker::Monitor),
        "severity_task" | "severity" => Some(Speaker::Severity),
        "strategy_task" | "strategy" => Some(Speaker::Strategy),
        "drafter_task" | "drafter" | "draft_task" => Some(Speaker::Drafter),
        "feedback_task" | "feedback" => Some(Speaker::Feedback),
        _ => None,
    }
}

/// Guess the role from the answer text alone.
///
/// Labelled answers are checked before bare severity words because a
/// feedback or strategy answer can mention "critical" in passing. Level
/// words only count as whole words ("FOLLOW" is not "LOW").
pub fn sniff_speaker(raw: &str) -> Option<Speaker> {
    let upper = raw.to_uppercase();
    if STATUS_REGEX.is_match(raw) || (upper.contains("STATUS:") && upper.contains("REASON:")) {
        return Some(Speaker::Feedback);
    }
    if upper.contains("ACTION:") && upper.contains("TONE:") {
        return Some(Speaker::Strategy);
    }
    if [&*CRITICAL_REGEX, &*MODERATE_REGEX, &*LOW_REGEX]
        .iter()
        .any(|re| re.is_match(raw))
    {
        return Some(Speaker::Severity);
    }
    if raw.contains('@') {
        return Some(Speaker::Monitor);
    }
    None
}

/// Step name, then agent role, then content.
pub fn resolve_step_speaker(step: &StepOutput, table: &SpeakerTable) -> Option<Speaker> {
    speaker_for_step_name(&step.name)
        .or_else(|| step.agent.as_deref().and_then(|agent| table.detect(agent)))
        .or_else(|| sniff_speaker(&step.raw))
}

/// Updates for every step that maps to a ledger slot, in step order.
pub fn reconcile_steps(steps: &[StepOutput], table: &SpeakerTable) -> Vec<LedgerUpdate> {
    steps
        .iter()
        .filter(|step| !step.raw.trim().is_empty())
        .filter_map(|step| {
            let speaker = resolve_step_speaker(step, table);
            if speaker.is_none() {
                tracing::debug!(step = %step.name, "step output matched no role");
            }
            speaker.and_then(|s| extract(s, &step.raw))
        })
        .collect()
}
