use std::fmt;

use serde::{Deserialize, Serialize};

/// A role in the crisis crew, or the implicit `System` speaker.
///
/// Serialized with the display name the crew prints in its trace, which is
/// also what the dashboard shows next to each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "Social Media Monitor", alias = "monitor")]
    Monitor,
    #[serde(rename = "Crisis Severity Classifier", alias = "severity")]
    Severity,
    #[serde(rename = "Brand Response Strategist", alias = "strategy")]
    Strategy,
    #[serde(rename = "PR Response Copywriter", alias = "drafter")]
    Drafter,
    #[serde(rename = "Post-Response Sentiment Monitor", alias = "feedback")]
    Feedback,
    #[default]
    #[serde(rename = "System", alias = "system")]
    System,
}

impl Speaker {
    /// Every crew role, in pipeline order. `System` is not a role.
    pub const ROLES: [Speaker; 5] = [
        Speaker::Monitor,
        Speaker::Severity,
        Speaker::Strategy,
        Speaker::Drafter,
        Speaker::Feedback,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Monitor => "Social Media Monitor",
            Self::Severity => "Crisis Severity Classifier",
            Self::Strategy => "Brand Response Strategist",
            Self::Drafter => "PR Response Copywriter",
            Self::Feedback => "Post-Response Sentiment Monitor",
            Self::System => "System",
        }
    }

    /// Short config key used in `crisis.toml`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Severity => "severity",
            Self::Strategy => "strategy",
            Self::Drafter => "drafter",
            Self::Feedback => "feedback",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
