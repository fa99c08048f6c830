//! Speaker attribution.
//!
//! A [`SpeakerTable`] maps each crew role to the substrings that identify it
//! in the trace. The [`AttributionTracker`] remembers who spoke last so that
//! un-attributed lines (tool calls, thoughts, answers) can be credited.

use crisis_common::Speaker;

use super::SpeakerPatterns;

/// Ordered, case-insensitive pattern table. First matching role wins.
#[derive(Debug, Clone, Default)]
pub struct SpeakerTable {
    entries: Vec<(Speaker, Vec<String>)>,
}

impl SpeakerTable {
    pub fn new(entries: &[SpeakerPatterns]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| {
                    let patterns = e
                        .patterns
                        .iter()
                        .map(|p| p.trim().to_lowercase())
                        .filter(|p| !p.is_empty())
                        .collect();
                    (e.speaker, patterns)
                })
                .collect(),
        }
    }

    /// Find the first role whose patterns occur in `text`.
    pub fn detect(&self, text: &str) -> Option<Speaker> {
        let lowered = text.to_lowercase();
        self.entries
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| lowered.contains(p.as_str())))
            .map(|(speaker, _)| *speaker)
    }
}

/// Tracks the current speaker across lines.
#[derive(Debug, Clone)]
pub struct AttributionTracker {
    table: SpeakerTable,
    current: Speaker,
}

impl AttributionTracker {
    pub fn new(table: SpeakerTable) -> Self {
        Self {
            table,
            current: Speaker::System,
        }
    }

    pub fn current(&self) -> Speaker {
        self.current
    }

    /// Update the current speaker from an attribution line. Returns the new
    /// speaker, or `None` when the line names nobody we know (the current
    /// speaker is then left unchanged).
    pub fn observe(&mut self, line: &str) -> Option<Speaker> {
        let speaker = self.table.detect(line)?;
        self.current = speaker;
        Some(speaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transducer::default_speaker_patterns;

    fn tracker() -> AttributionTracker {
        AttributionTracker::new(SpeakerTable::new(&default_speaker_patterns()))
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        let table = SpeakerTable::new(&default_speaker_patterns());
        assert_eq!(
            table.detect("agent: brand response STRATEGIST"),
            Some(Speaker::Strategy)
        );
    }

    #[test]
    fn test_detect_first_match_wins() {
        let table = SpeakerTable::new(&[
            SpeakerPatterns {
                speaker: Speaker::Severity,
                patterns: vec!["Monitor".into()],
            },
            SpeakerPatterns {
                speaker: Speaker::Monitor,
                patterns: vec!["Monitor".into()],
            },
        ]);
        assert_eq!(table.detect("Agent: Monitor"), Some(Speaker::Severity));
    }

    #[test]
    fn test_sentiment_monitor_is_not_social_monitor() {
        let table = SpeakerTable::new(&default_speaker_patterns());
        assert_eq!(
            table.detect("Agent: Post-Response Sentiment Monitor"),
            Some(Speaker::Feedback)
        );
    }

    #[test]
    fn test_tracker_starts_as_system() {
        assert_eq!(tracker().current(), Speaker::System);
    }

    #[test]
    fn test_unmatched_attribution_keeps_speaker() {
        let mut tracker = tracker();
        assert_eq!(tracker.observe("Agent: PR Response Copywriter"), Some(Speaker::Drafter));
        assert_eq!(tracker.observe("Agent: Legal Counsel"), None);
        assert_eq!(tracker.current(), Speaker::Drafter);
    }

    #[test]
    fn test_empty_patterns_never_match() {
        let table = SpeakerTable::new(&[SpeakerPatterns {
            speaker: Speaker::Monitor,
            patterns: vec!["  ".into()],
        }]);
        assert_eq!(table.detect("anything at all"), None);
    }
}
