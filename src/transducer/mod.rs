//! Log-to-event transducer.
//!
//! Turns the crew's noisy, ANSI-decorated progress trace into typed events
//! and, whenever a role finishes its final answer, into decision-ledger
//! updates.
//!
//! ```text
//! raw chunks ─> LineSplitter ─> Classifier ─┬─> Event Log   (every event)
//!  (normalize)   (speaker +     state machine) └─> Decision Extractor
//!                                                  (completed answers)
//! ```
//!
//! The [`Transducer`] is the [`TraceSink`] handed to the workflow engine for
//! the duration of one run. Classification never fails; lines it does not
//! recognise simply produce no event.

mod classifier;
mod normalize;
mod speaker;

pub use classifier::{Classified, Classifier};
pub use normalize::{
    LineSplitter, NoiseFilter, normalize_chunk, normalize_line, strip_ansi, strip_box_padding,
};
pub use speaker::{AttributionTracker, SpeakerTable};

use std::sync::Arc;

use crisis_common::Speaker;
use serde::{Deserialize, Serialize};

use crate::decisions;
use crate::engine::TraceSink;
use crate::state::RunState;

/// Patterns that identify one crew role in attribution lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerPatterns {
    pub speaker: Speaker,
    pub patterns: Vec<String>,
}

/// `[transducer]` section of `crisis.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransducerConfig {
    /// Lines containing any of these substrings are dropped before classification
    #[serde(default = "default_noise_patterns")]
    pub noise_patterns: Vec<String>,
    /// Ordered role table; the first role with a matching pattern wins
    #[serde(default = "default_speaker_patterns")]
    pub speakers: Vec<SpeakerPatterns>,
}

impl Default for TransducerConfig {
    fn default() -> Self {
        Self {
            noise_patterns: default_noise_patterns(),
            speakers: default_speaker_patterns(),
        }
    }
}

impl TransducerConfig {
    pub fn speaker_table(&self) -> SpeakerTable {
        SpeakerTable::new(&self.speakers)
    }
}

pub fn default_noise_patterns() -> Vec<String> {
    [
        "LiteLLM",
        "HTTP Request:",
        "Provider List:",
        "DeprecationWarning",
        "SyntaxWarning",
        "Telemetry",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_speaker_patterns() -> Vec<SpeakerPatterns> {
    let entry = |speaker, patterns: &[&str]| SpeakerPatterns {
        speaker,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    };
    vec![
        entry(Speaker::Monitor, &["Social Media Monitor", "Monitor Agent"]),
        entry(Speaker::Severity, &["Crisis Severity Classifier", "Severity"]),
        entry(Speaker::Strategy, &["Brand Response Strategist", "Strategist"]),
        entry(
            Speaker::Drafter,
            &["PR Response Copywriter", "Copywriter", "Drafter"],
        ),
        entry(
            Speaker::Feedback,
            &["Post-Response Sentiment Monitor", "Feedback"],
        ),
    ]
}

/// Trace sink that classifies lines into the shared run state.
///
/// One instance per run; its capture state is discarded with it.
pub struct Transducer {
    classifier: Classifier,
    state: Arc<RunState>,
}

impl Transducer {
    pub fn new(config: &TransducerConfig, state: Arc<RunState>) -> Self {
        Self {
            classifier: Classifier::new(config),
            state,
        }
    }

    fn apply(&self, classified: Vec<Classified>) {
        for item in classified {
            match item {
                Classified::Event(draft) => {
                    if let Err(e) = self.state.append(draft) {
                        tracing::warn!(error = %e, "dropping trace event");
                    }
                }
                Classified::Answer { speaker, text } => {
                    let Some(update) = decisions::extract(speaker, &text) else {
                        continue;
                    };
                    tracing::debug!(speaker = %speaker, "inline decision extracted");
                    if let Err(e) = self.state.apply_decision(update) {
                        tracing::warn!(error = %e, "dropping inline decision");
                    }
                }
            }
        }
    }
}

impl TraceSink for Transducer {
    fn write(&mut self, chunk: &str) {
        let classified = self.classifier.write_chunk(chunk);
        self.apply(classified);
    }

    fn close(&mut self) {
        let classified = self.classifier.finish();
        self.apply(classified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisis_common::{EventKind, SeverityLevel};

    fn state() -> Arc<RunState> {
        Arc::new(RunState::new(16))
    }

    #[test]
    fn test_default_config_has_every_role() {
        let config = TransducerConfig::default();
        let speakers: Vec<Speaker> = config.speakers.iter().map(|e| e.speaker).collect();
        assert_eq!(speakers, Speaker::ROLES.to_vec());
    }

    #[test]
    fn test_transducer_appends_events_and_decisions() {
        let state = state();
        let mut transducer = Transducer::new(&TransducerConfig::default(), state.clone());
        transducer.write("Agent: Crisis Severity Classifier\nFinal Answer: CRITICAL");
        transducer.write(" - recall rumours trending\n");
        transducer.close();

        let events = state.events().unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::AgentStart, EventKind::Thought, EventKind::FinalAnswer]
        );
        let ids: Vec<u64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let severity = state.ledger().unwrap().severity.unwrap();
        assert_eq!(severity.level, SeverityLevel::Critical);
        assert_eq!(severity.reasoning, "recall rumours trending");
    }

    #[test]
    fn test_drafter_answer_leaves_ledger_empty() {
        let state = state();
        let mut transducer = Transducer::new(&TransducerConfig::default(), state.clone());
        transducer.write("Agent: PR Response Copywriter\nFinal Answer: We hear you and we are sorry.\n");
        transducer.close();
        assert!(state.ledger().unwrap().is_empty());
        assert_eq!(state.events().unwrap().len(), 3);
    }
}
