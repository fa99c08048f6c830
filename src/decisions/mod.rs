//! Decision extraction from role final answers.
//!
//! Each crew role that owns a ledger slot has one pattern rule:
//! - Monitor → `monitor_summary` (flagged table rows, summed engagement)
//! - Severity → `severity` (`CRITICAL` / `MODERATE` / `LOW`)
//! - Strategy → `strategy` (`ACTION:` / `TONE:` / `ESCALATE:` labels)
//! - Feedback → `recommendation` (`STATUS:` / `REASON:` labels)
//!
//! Rules never fail. Missing or malformed labels produce explicit defaults
//! so a slot is always set once its role has answered.

mod reconcile;

pub use reconcile::{reconcile_steps, resolve_step_speaker, sniff_speaker, speaker_for_step_name};

use crisis_common::{
    DecisionLedger, MonitorSummary, Recommendation, RecommendationStatus, SeverityAssessment,
    SeverityLevel, Speaker, Strategy, truncate_chars,
};
use regex::Regex;
use std::sync::LazyLock;

const REASONING_LIMIT: usize = 200;
const REASON_LIMIT: usize = 200;
/// Numbers at or below this are treated as row ids, not engagement counts.
const ENGAGEMENT_FLOOR: u64 = 10;
const COLUMN_SEPARATOR: char = '|';

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static CRITICAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCRITICAL\b").unwrap());
static MODERATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bMODERATE\b").unwrap());
static LOW_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bLOW\b").unwrap());

// Leading level word plus the punctuation that usually separates it from the
// explanation ("CRITICAL - ...", "**Moderate:** ...").
static LEADING_LEVEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s*]*(?:critical|moderate|low)\b[\s*:.|\-–—]*").unwrap()
});

static ACTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ACTION:\**\s*([^\s|,;*]+)").unwrap());
static TONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TONE:\**\s*([^\s|,;*]+)").unwrap());
static ESCALATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ESCALATE:\**\s*([^\s|,;*]+)").unwrap());

static STATUS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)STATUS:\**\s*(ESCALATE|FOLLOW[\s_-]*UP|RESOLVED)\b").unwrap()
});
static REASON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)REASON:\**[ \t]*([^\r\n]*)").unwrap());

/// A replacement value for exactly one ledger slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerUpdate {
    Severity(SeverityAssessment),
    Strategy(Strategy),
    Recommendation(Recommendation),
    MonitorSummary(MonitorSummary),
}

impl LedgerUpdate {
    /// Overwrite the owning slot wholesale.
    pub fn apply(self, ledger: &mut DecisionLedger) {
        match self {
            Self::Severity(v) => ledger.severity = Some(v),
            Self::Strategy(v) => ledger.strategy = Some(v),
            Self::Recommendation(v) => ledger.recommendation = Some(v),
            Self::MonitorSummary(v) => ledger.monitor_summary = Some(v),
        }
    }
}

/// Run the rule owned by `speaker`. Roles without a slot return `None`.
pub fn extract(speaker: Speaker, text: &str) -> Option<LedgerUpdate> {
    match speaker {
        Speaker::Monitor => Some(LedgerUpdate::MonitorSummary(parse_monitor(text))),
        Speaker::Severity => Some(LedgerUpdate::Severity(parse_severity(text))),
        Speaker::Strategy => Some(LedgerUpdate::Strategy(parse_strategy(text))),
        Speaker::Feedback => Some(LedgerUpdate::Recommendation(parse_recommendation(text))),
        Speaker::Drafter | Speaker::System => None,
    }
}

/// Count table rows and sum the engagement figures in them.
pub fn parse_monitor(text: &str) -> MonitorSummary {
    let flagged: Vec<&str> = text
        .lines()
        .filter(|line| line.contains(COLUMN_SEPARATOR))
        .collect();

    let total_engagement = flagged
        .iter()
        .flat_map(|line| NUMBER_REGEX.find_iter(line))
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .filter(|n| *n > ENGAGEMENT_FLOOR)
        .fold(0u64, |acc, n| acc.saturating_add(n));

    MonitorSummary {
        flagged_count: flagged.len() as u64,
        total_engagement,
    }
}

/// First level present, in priority order; `MODERATE` if none.
pub fn parse_severity(text: &str) -> SeverityAssessment {
    let level = [
        (SeverityLevel::Critical, &*CRITICAL_REGEX),
        (SeverityLevel::Moderate, &*MODERATE_REGEX),
        (SeverityLevel::Low, &*LOW_REGEX),
    ]
    .into_iter()
    .find(|(_, re)| re.is_match(text))
    .map(|(level, _)| level)
    .unwrap_or(SeverityLevel::Moderate);

    let reasoning = LEADING_LEVEL_REGEX.replace(text.trim(), "");
    SeverityAssessment {
        level,
        reasoning: truncate_chars(reasoning.trim(), REASONING_LIMIT),
    }
}

fn capture_token(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn parse_strategy(text: &str) -> Strategy {
    let escalate = capture_token(&ESCALATE_REGEX, text)
        .map(|token| token.eq_ignore_ascii_case("YES"))
        .unwrap_or(false);
    Strategy {
        action: capture_token(&ACTION_REGEX, text).unwrap_or_else(|| "unknown".to_string()),
        tone: capture_token(&TONE_REGEX, text).unwrap_or_else(|| "unknown".to_string()),
        escalate,
    }
}

pub fn parse_recommendation(text: &str) -> Recommendation {
    let status = capture_token(&STATUS_REGEX, text)
        .map(|raw| {
            let upper = raw.to_uppercase();
            if upper.starts_with("ESCALATE") {
                RecommendationStatus::Escalate
            } else if upper.starts_with("RESOLVED") {
                RecommendationStatus::Resolved
            } else {
                RecommendationStatus::FollowUp
            }
        })
        .unwrap_or(RecommendationStatus::Unknown);

    let reason = capture_token(&REASON_REGEX, text)
        .map(|r| truncate_chars(r.trim(), REASON_LIMIT))
        .unwrap_or_default();

    Recommendation { status, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_reason_on_one_line() {
        let rec = parse_recommendation("STATUS: ESCALATE | REASON: sentiment worsening");
        assert_eq!(rec.status, RecommendationStatus::Escalate);
        assert_eq!(rec.reason, "sentiment worsening");
    }

    #[test]
    fn test_follow_up_tolerates_whitespace_and_case() {
        let rec = parse_recommendation("status:   follow   up\nreason: a few holdouts remain");
        assert_eq!(rec.status, RecommendationStatus::FollowUp);
        assert_eq!(rec.reason, "a few holdouts remain");
    }

    #[test]
    fn test_recommendation_defaults() {
        let rec = parse_recommendation("Sentiment is mixed; keep watching.");
        assert_eq!(rec.status, RecommendationStatus::Unknown);
        assert_eq!(rec.reason, "");
    }

    #[test]
    fn test_unrecognised_status_value_is_unknown() {
        let rec = parse_recommendation("STATUS: PENDING\nREASON: waiting on legal");
        assert_eq!(rec.status, RecommendationStatus::Unknown);
        assert_eq!(rec.reason, "waiting on legal");
    }

    #[test]
    fn test_reason_truncated() {
        let text = format!("STATUS: RESOLVED\nREASON: {}", "calm ".repeat(100));
        let rec = parse_recommendation(&text);
        assert_eq!(rec.status, RecommendationStatus::Resolved);
        assert_eq!(rec.reason.chars().count(), REASON_LIMIT);
    }

    #[test]
    fn test_strategy_labels() {
        let s = parse_strategy("ACTION: apologize | TONE: empathetic | ESCALATE: yes");
        assert_eq!(s.action, "apologize");
        assert_eq!(s.tone, "empathetic");
        assert!(s.escalate);
    }

    #[test]
    fn test_strategy_markdown_bold_labels() {
        let s = parse_strategy("**ACTION:** clarify\n**TONE:** calm\n**ESCALATE:** NO");
        assert_eq!(s.action, "clarify");
        assert_eq!(s.tone, "calm");
        assert!(!s.escalate);
    }

    #[test]
    fn test_strategy_defaults() {
        let s = parse_strategy("We should probably say something nice.");
        assert_eq!(s.action, "unknown");
        assert_eq!(s.tone, "unknown");
        assert!(!s.escalate);
    }

    #[test]
    fn test_severity_priority_and_reasoning() {
        let s = parse_severity("CRITICAL - health complaints with LOW volume but high reach");
        assert_eq!(s.level, SeverityLevel::Critical);
        assert_eq!(s.reasoning, "health complaints with LOW volume but high reach");
    }

    #[test]
    fn test_severity_case_insensitive_anywhere() {
        let s = parse_severity("Overall this looks low risk for now.");
        assert_eq!(s.level, SeverityLevel::Low);
        assert_eq!(s.reasoning, "Overall this looks low risk for now.");
    }

    #[test]
    fn test_severity_ignores_embedded_words() {
        let s = parse_severity("Please follow the playbook below.");
        assert_eq!(s.level, SeverityLevel::Moderate);
    }

    #[test]
    fn test_severity_strips_bold_level_prefix() {
        let s = parse_severity("**Moderate:** shipping delays");
        assert_eq!(s.level, SeverityLevel::Moderate);
        assert_eq!(s.reasoning, "shipping delays");
    }

    #[test]
    fn test_monitor_counts_rows_and_sums_large_numbers() {
        let text = "Flagged posts:\n| 1 | @angry_dan | burnt taste | 120 likes | 45 RTs |\n| 2 | @sam | refund please | 8 | 30 |\nNo other issues.";
        let summary = parse_monitor(text);
        assert_eq!(summary.flagged_count, 2);
        assert_eq!(summary.total_engagement, 120 + 45 + 30);
    }

    #[test]
    fn test_monitor_without_table() {
        let summary = parse_monitor("Nothing concerning in the feed.");
        assert_eq!(summary, MonitorSummary::default());
    }

    #[test]
    fn test_extract_routes_by_speaker() {
        assert!(matches!(
            extract(Speaker::Monitor, "| a | 50 |"),
            Some(LedgerUpdate::MonitorSummary(_))
        ));
        assert!(matches!(
            extract(Speaker::Feedback, "STATUS: RESOLVED"),
            Some(LedgerUpdate::Recommendation(_))
        ));
        assert!(extract(Speaker::Drafter, "Dear customers...").is_none());
        assert!(extract(Speaker::System, "anything").is_none());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "ACTION: pause_campaign\nTONE: apologetic\nESCALATE: YES";
        assert_eq!(
            extract(Speaker::Strategy, text),
            extract(Speaker::Strategy, text)
        );
    }

    #[test]
    fn test_apply_overwrites_slot() {
        let mut ledger = DecisionLedger::default();
        extract(Speaker::Severity, "LOW").unwrap().apply(&mut ledger);
        extract(Speaker::Severity, "CRITICAL now").unwrap().apply(&mut ledger);
        let severity = ledger.severity.unwrap();
        assert_eq!(severity.level, SeverityLevel::Critical);
        assert_eq!(severity.reasoning, "now");
        assert!(ledger.strategy.is_none());
    }
}
