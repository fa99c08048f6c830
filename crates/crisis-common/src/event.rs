use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::speaker::Speaker;

/// Kind of a trace-derived event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentStart,
    TaskStart,
    AgentComplete,
    ToolCall,
    ToolResult,
    Thought,
    FinalAnswer,
    System,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStart => "agent_start",
            Self::TaskStart => "task_start",
            Self::AgentComplete => "agent_complete",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Thought => "thought",
            Self::FinalAnswer => "final_answer",
            Self::System => "system",
            Self::Error => "error",
        }
    }

    /// Longest message, in characters, an event of this kind may carry.
    pub fn message_limit(&self) -> usize {
        match self {
            Self::FinalAnswer => 300,
            _ => 200,
        }
    }
}

/// An event that has been classified but not yet appended to the log.
///
/// The log assigns the sequence id and timestamp on append, so drafts are
/// cheap to compare in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub speaker: Speaker,
    pub kind: EventKind,
    pub message: String,
}

impl EventDraft {
    /// Build a draft, truncating the message to the kind's limit.
    pub fn new(speaker: Speaker, kind: EventKind, message: impl AsRef<str>) -> Self {
        Self {
            speaker,
            kind,
            message: crate::truncate_chars(message.as_ref(), kind.message_limit()),
        }
    }
}

/// A structured, immutable record derived from the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic, 1-based, gap-free within a run.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "agent")]
    pub speaker: Speaker,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

impl Event {
    pub fn from_draft(id: u64, draft: EventDraft) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            speaker: draft.speaker,
            message: draft.message,
            kind: draft.kind,
        }
    }
}
