use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Process-wide status of the crew run.
///
/// `final_output` holds the crew's final text on completion or the error
/// message on failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStatus {
    pub status: RunPhase,
    pub final_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl RunStatus {
    pub fn running(run_id: Uuid) -> Self {
        Self {
            status: RunPhase::Running,
            final_output: None,
            run_id: Some(run_id),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunPhase::Running
    }
}

/// Whether a status transition is allowed.
pub fn is_valid_transition(from: RunPhase, to: RunPhase) -> bool {
    matches!(
        (from, to),
        (RunPhase::Idle, RunPhase::Running)
            | (RunPhase::Completed, RunPhase::Running)
            | (RunPhase::Error, RunPhase::Running)
            | (RunPhase::Running, RunPhase::Completed)
            | (RunPhase::Running, RunPhase::Error)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_idle() {
        let status = RunStatus::default();
        assert_eq!(status.status, RunPhase::Idle);
        assert!(status.final_output.is_none());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "idle");
        assert!(json.get("run_id").is_none());
    }

    #[test]
    fn test_valid_transitions() {
        assert!(is_valid_transition(RunPhase::Idle, RunPhase::Running));
        assert!(is_valid_transition(RunPhase::Running, RunPhase::Completed));
        assert!(is_valid_transition(RunPhase::Running, RunPhase::Error));
        assert!(is_valid_transition(RunPhase::Completed, RunPhase::Running));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!is_valid_transition(RunPhase::Running, RunPhase::Running));
        assert!(!is_valid_transition(RunPhase::Idle, RunPhase::Completed));
        assert!(!is_valid_transition(RunPhase::Completed, RunPhase::Error));
    }
}
