//! Decision Ledger: the four-slot summary built from each role's final answer.
//!
//! Every slot is independent and is replaced wholesale when its owning
//! role's answer is parsed; the ledger never merges two parses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Critical,
    Moderate,
    Low,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Moderate => "MODERATE",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub level: SeverityLevel,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub action: String,
    pub tone: String,
    pub escalate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    Escalate,
    FollowUp,
    Resolved,
    Unknown,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalate => "ESCALATE",
            Self::FollowUp => "FOLLOW_UP",
            Self::Resolved => "RESOLVED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub status: RecommendationStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub flagged_count: u64,
    pub total_engagement: u64,
}

/// One ledger per run. `None` means the owning role has not answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecisionLedger {
    pub severity: Option<SeverityAssessment>,
    pub strategy: Option<Strategy>,
    pub recommendation: Option<Recommendation>,
    pub monitor_summary: Option<MonitorSummary>,
}

impl DecisionLedger {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_serializes_nulls() {
        let json = serde_json::to_value(DecisionLedger::default()).unwrap();
        assert!(json["severity"].is_null());
        assert!(json["strategy"].is_null());
        assert!(json["recommendation"].is_null());
        assert!(json["monitor_summary"].is_null());
    }

    #[test]
    fn test_recommendation_status_wire_names() {
        let rec = Recommendation {
            status: RecommendationStatus::FollowUp,
            reason: String::new(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "FOLLOW_UP");
    }

    #[test]
    fn test_reset_clears_every_slot() {
        let mut ledger = DecisionLedger {
            monitor_summary: Some(MonitorSummary {
                flagged_count: 2,
                total_engagement: 40,
            }),
            ..Default::default()
        };
        assert!(!ledger.is_empty());
        ledger.reset();
        assert!(ledger.is_empty());
    }
}
