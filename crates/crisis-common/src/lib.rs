//! Shared domain types for the crisis relay.
//!
//! These types cross every boundary in the system: the transducer produces
//! [`Event`]s, the decision extractor fills a [`DecisionLedger`], the run
//! controller owns a [`RunStatus`], and the feed engine moves [`FeedItem`]s.
//! The wire form of each type is the JSON the dashboard consumes, so field
//! names and enum spellings here are part of the external interface.

pub mod decision;
pub mod event;
pub mod feed;
pub mod run;
pub mod speaker;

pub use decision::{
    DecisionLedger, MonitorSummary, Recommendation, RecommendationStatus, SeverityAssessment,
    SeverityLevel, Strategy,
};
pub use event::{Event, EventDraft, EventKind};
pub use feed::{FeedItem, WaveFile};
pub use run::{RunPhase, RunStatus};
pub use speaker::Speaker;

/// Truncate `text` to at most `max_chars` characters, respecting UTF-8
/// boundaries. Used for every length-capped message in the system.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_chars_exact_length() {
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "✓✓✓✓";
        assert_eq!(truncate_chars(text, 2), "✓✓");
    }
}
