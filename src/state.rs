//! Process-scoped run state: event log, decision ledger, run status.
//!
//! All three live behind one mutex so every mutation (append, reset, slot
//! update, status change) is a single critical section, and readers always
//! get a full copy taken under that same lock. Every mutation is also
//! published on a broadcast channel for WebSocket subscribers.

use std::sync::{Mutex, MutexGuard};

use crisis_common::run::is_valid_transition;
use crisis_common::{
    DecisionLedger, Event, EventDraft, EventKind, RunPhase, RunStatus, Speaker, truncate_chars,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dashboard::ws::{WsMessage, broadcast_message};
use crate::decisions::LedgerUpdate;
use crate::errors::RunError;

/// Longest error text kept in the run status.
const STATUS_ERROR_LIMIT: usize = 500;
/// Longest error text repeated in the `error` event.
const EVENT_ERROR_LIMIT: usize = 100;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    ledger: DecisionLedger,
    status: RunStatus,
}

pub struct RunState {
    inner: Mutex<Inner>,
    tx: broadcast::Sender<String>,
}

impl RunState {
    /// `capacity` bounds the broadcast backlog for slow subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(Inner::default()),
            tx,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RunError> {
        self.inner.lock().map_err(|_| RunError::LockPoisoned)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Check-and-set start of a run.
    ///
    /// Fails with [`RunError::AlreadyRunning`] without touching anything if a
    /// run is in flight. Otherwise clears the log, resets the ledger, marks
    /// the status running, and appends the start event, all under one lock.
    pub fn try_begin_run(&self) -> Result<Uuid, RunError> {
        let run_id = Uuid::new_v4();
        let (status, event) = {
            let mut inner = self.lock()?;
            if inner.status.is_running() {
                return Err(RunError::AlreadyRunning);
            }
            inner.events.clear();
            inner.ledger.reset();
            inner.status = RunStatus::running(run_id);
            let event = Self::push_event(
                &mut inner,
                EventDraft::new(Speaker::System, EventKind::System, "🚨 Crisis crew triggered"),
            );
            (inner.status.clone(), event)
        };

        broadcast_message(&self.tx, &WsMessage::RunStatusChanged { status });
        broadcast_message(&self.tx, &WsMessage::AgentEvent { event });
        Ok(run_id)
    }

    fn push_event(inner: &mut Inner, draft: EventDraft) -> Event {
        let id = inner.events.len() as u64 + 1;
        let event = Event::from_draft(id, draft);
        inner.events.push(event.clone());
        event
    }

    /// Append an event, assigning the next sequence id.
    pub fn append(&self, draft: EventDraft) -> Result<Event, RunError> {
        let event = {
            let mut inner = self.lock()?;
            Self::push_event(&mut inner, draft)
        };
        broadcast_message(&self.tx, &WsMessage::AgentEvent { event: event.clone() });
        Ok(event)
    }

    /// Overwrite one ledger slot.
    pub fn apply_decision(&self, update: LedgerUpdate) -> Result<(), RunError> {
        let ledger = {
            let mut inner = self.lock()?;
            update.apply(&mut inner.ledger);
            inner.ledger.clone()
        };
        broadcast_message(&self.tx, &WsMessage::DecisionsUpdated { decisions: ledger });
        Ok(())
    }

    /// Mark the run completed with the crew's final text.
    pub fn complete(&self, final_output: String) -> Result<RunStatus, RunError> {
        self.finish(
            RunPhase::Completed,
            final_output,
            EventDraft::new(
                Speaker::System,
                EventKind::System,
                "✅ Crew completed successfully",
            ),
        )
    }

    /// Mark the run failed. The events and ledger gathered so far are kept.
    pub fn fail(&self, message: &str) -> Result<RunStatus, RunError> {
        self.finish(
            RunPhase::Error,
            truncate_chars(message, STATUS_ERROR_LIMIT),
            EventDraft::new(
                Speaker::System,
                EventKind::Error,
                format!("❌ Error: {}", truncate_chars(message, EVENT_ERROR_LIMIT)),
            ),
        )
    }

    fn finish(
        &self,
        phase: RunPhase,
        final_output: String,
        draft: EventDraft,
    ) -> Result<RunStatus, RunError> {
        let (status, event) = {
            let mut inner = self.lock()?;
            let from = inner.status.status;
            if !is_valid_transition(from, phase) {
                return Err(RunError::InvalidTransition { from, to: phase });
            }
            inner.status.status = phase;
            inner.status.final_output = Some(final_output);
            let event = Self::push_event(&mut inner, draft);
            (inner.status.clone(), event)
        };
        broadcast_message(&self.tx, &WsMessage::AgentEvent { event });
        broadcast_message(
            &self.tx,
            &WsMessage::RunStatusChanged {
                status: status.clone(),
            },
        );
        Ok(status)
    }

    pub fn events(&self) -> Result<Vec<Event>, RunError> {
        Ok(self.lock()?.events.clone())
    }

    /// Events with an id greater than `after`, for incremental polling.
    pub fn events_since(&self, after: u64) -> Result<Vec<Event>, RunError> {
        let inner = self.lock()?;
        let start = (after as usize).min(inner.events.len());
        Ok(inner.events[start..].to_vec())
    }

    pub fn ledger(&self) -> Result<DecisionLedger, RunError> {
        Ok(self.lock()?.ledger.clone())
    }

    pub fn status(&self) -> Result<RunStatus, RunError> {
        Ok(self.lock()?.status.clone())
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisis_common::{MonitorSummary, SeverityAssessment, SeverityLevel};

    fn thought(message: &str) -> EventDraft {
        EventDraft::new(Speaker::Monitor, EventKind::Thought, message)
    }

    #[test]
    fn test_begin_run_resets_and_logs_start() {
        let state = RunState::default();
        state.try_begin_run().unwrap();
        state.append(thought("first run thought")).unwrap();
        state.complete("done".into()).unwrap();

        state.try_begin_run().unwrap();
        let events = state.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 1);
        assert_eq!(events[0].kind, EventKind::System);
        assert!(state.status().unwrap().is_running());
    }

    #[test]
    fn test_second_begin_while_running_is_conflict_without_mutation() {
        let state = RunState::default();
        state.try_begin_run().unwrap();
        state.append(thought("keep me")).unwrap();
        state
            .apply_decision(LedgerUpdate::MonitorSummary(MonitorSummary {
                flagged_count: 1,
                total_engagement: 20,
            }))
            .unwrap();

        let before_events = state.events().unwrap();
        let before_ledger = state.ledger().unwrap();
        let err = state.try_begin_run().unwrap_err();
        assert!(matches!(err, RunError::AlreadyRunning));
        assert_eq!(state.events().unwrap(), before_events);
        assert_eq!(state.ledger().unwrap(), before_ledger);
    }

    #[test]
    fn test_ids_are_gap_free() {
        let state = RunState::default();
        state.try_begin_run().unwrap();
        for i in 0..10 {
            state.append(thought(&format!("thought {}", i))).unwrap();
        }
        let ids: Vec<u64> = state.events().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=11).collect::<Vec<u64>>());
    }

    #[test]
    fn test_events_since() {
        let state = RunState::default();
        state.try_begin_run().unwrap();
        state.append(thought("a")).unwrap();
        state.append(thought("b")).unwrap();
        let tail = state.events_since(2).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].message, "b");
        assert!(state.events_since(99).unwrap().is_empty());
    }

    #[test]
    fn test_fail_records_error_and_keeps_ledger() {
        let state = RunState::default();
        state.try_begin_run().unwrap();
        state
            .apply_decision(LedgerUpdate::Severity(SeverityAssessment {
                level: SeverityLevel::Low,
                reasoning: String::new(),
            }))
            .unwrap();
        let long = "boom ".repeat(200);
        let status = state.fail(&long).unwrap();
        assert_eq!(status.status, RunPhase::Error);
        assert_eq!(status.final_output.unwrap().chars().count(), STATUS_ERROR_LIMIT);

        let last = state.events().unwrap().pop().unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert!(last.message.starts_with("❌ Error: boom"));
        assert!(state.ledger().unwrap().severity.is_some());
    }

    #[test]
    fn test_finish_outside_running_run_is_rejected() {
        let state = RunState::default();
        let err = state.complete("early".into()).unwrap_err();
        assert!(matches!(
            err,
            RunError::InvalidTransition {
                from: RunPhase::Idle,
                to: RunPhase::Completed
            }
        ));
        assert!(state.events().unwrap().is_empty());

        state.try_begin_run().unwrap();
        state.complete("done".into()).unwrap();
        assert!(matches!(
            state.fail("late failure").unwrap_err(),
            RunError::InvalidTransition { .. }
        ));
        let status = state.status().unwrap();
        assert_eq!(status.status, RunPhase::Completed);
        assert_eq!(status.final_output.as_deref(), Some("done"));
        assert_eq!(state.events().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mutations_are_broadcast() {
        let state = RunState::default();
        let mut rx = state.subscribe();
        state.try_begin_run().unwrap();

        let status_msg = rx.recv().await.unwrap();
        assert!(status_msg.contains("\"type\":\"RunStatusChanged\""));
        let event_msg = rx.recv().await.unwrap();
        assert!(event_msg.contains("\"type\":\"AgentEvent\""));
        assert!(event_msg.contains("Crisis crew triggered"));
    }
}
