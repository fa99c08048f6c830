//! Run controller.
//!
//! Admits at most one crew run at a time, drives the workflow engine with a
//! fresh [`Transducer`] as its trace sink, and records the outcome in the
//! shared [`RunState`].
//!
//! Execution happens on a spawned task so status and event reads stay
//! responsive. A supervisor task awaits it and always moves the run to a
//! terminal status, including when the engine panics.

use std::sync::Arc;

use crisis_common::{DecisionLedger, Event, RunStatus};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::decisions::reconcile_steps;
use crate::engine::{EchoSink, TraceSink, WorkflowEngine};
use crate::errors::RunError;
use crate::state::RunState;
use crate::transducer::{Transducer, TransducerConfig};

/// Final snapshot of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Full error text when the run failed; the status keeps a truncated copy
    pub error: Option<String>,
    pub events: Vec<Event>,
    pub decisions: DecisionLedger,
}

#[derive(Clone)]
pub struct RunController {
    state: Arc<RunState>,
    engine: Arc<dyn WorkflowEngine>,
    transducer: Arc<TransducerConfig>,
    echo: bool,
}

impl RunController {
    pub fn new(
        state: Arc<RunState>,
        engine: Arc<dyn WorkflowEngine>,
        transducer: TransducerConfig,
    ) -> Self {
        Self {
            state,
            engine,
            transducer: Arc::new(transducer),
            echo: false,
        }
    }

    /// Also print the raw trace to stdout while it is classified.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Admit a run and start it in the background.
    ///
    /// Returns [`RunError::AlreadyRunning`] without side effects when a run
    /// is in flight.
    pub fn start(&self) -> Result<JoinHandle<RunOutcome>, RunError> {
        let run_id = self.state.try_begin_run()?;
        tracing::info!(%run_id, "crew run started");

        let this = self.clone();
        Ok(tokio::spawn(async move {
            let exec = this.clone();
            let result = tokio::spawn(async move { exec.execute().await }).await;

            let (finished, error) = match result {
                Ok(Ok(final_output)) => {
                    tracing::info!(%run_id, "crew run completed");
                    (this.state.complete(final_output), None)
                }
                Ok(Err(message)) => {
                    tracing::error!(%run_id, error = %message, "crew run failed");
                    (this.state.fail(&message), Some(message))
                }
                Err(join_err) => {
                    let message = RunError::Join(join_err).to_string();
                    tracing::error!(%run_id, error = %message, "crew run aborted");
                    (this.state.fail(&message), Some(message))
                }
            };
            let status = finished.unwrap_or_else(|e| {
                tracing::error!(%run_id, error = %e, "could not record run outcome");
                RunStatus::default()
            });

            RunOutcome {
                run_id,
                status,
                error,
                events: this.state.events().unwrap_or_default(),
                decisions: this.state.ledger().unwrap_or_default(),
            }
        }))
    }

    /// Start a run and wait for it to finish.
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        self.start()?.await.map_err(RunError::Join)
    }

    /// Drive the engine once. Returns the final text or the error message.
    async fn execute(&self) -> Result<String, String> {
        let transducer = Transducer::new(&self.transducer, Arc::clone(&self.state));
        let mut sink: Box<dyn TraceSink> = if self.echo {
            Box::new(EchoSink::new(transducer))
        } else {
            Box::new(transducer)
        };

        let result = self.engine.kickoff(sink.as_mut()).await;
        sink.close();
        let output = result.map_err(|e| format!("{:#}", e))?;

        // Step outputs are authoritative; they land after any inline parse.
        let table = self.transducer.speaker_table();
        for update in reconcile_steps(&output.steps, &table) {
            if let Err(e) = self.state.apply_decision(update) {
                tracing::warn!(error = %e, "dropping reconciled decision");
            }
        }
        Ok(output.final_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineOutput, RunScript, ScriptedEngine, StepOutput};
    use async_trait::async_trait;
    use crisis_common::{EventKind, RunPhase, SeverityLevel};
    use tokio::sync::Notify;

    fn controller(engine: impl WorkflowEngine + 'static) -> RunController {
        RunController::new(
            Arc::new(RunState::default()),
            Arc::new(engine),
            TransducerConfig::default(),
        )
    }

    /// Writes one line, then blocks until released.
    struct GateEngine {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl WorkflowEngine for GateEngine {
        async fn kickoff(&self, sink: &mut dyn TraceSink) -> anyhow::Result<EngineOutput> {
            sink.write("Agent: Social Media Monitor\n");
            self.release.notified().await;
            Ok(EngineOutput {
                final_output: "released".into(),
                steps: Vec::new(),
            })
        }
    }

    struct PanicEngine;

    #[async_trait]
    impl WorkflowEngine for PanicEngine {
        async fn kickoff(&self, _sink: &mut dyn TraceSink) -> anyhow::Result<EngineOutput> {
            panic!("engine exploded");
        }
    }

    #[tokio::test]
    async fn test_successful_run() {
        let engine = ScriptedEngine::new(RunScript {
            trace: vec![
                "Agent: Crisis Severity Classifier\n".into(),
                "Final Answer: LOW - a single complaint\n".into(),
            ],
            steps: vec![StepOutput {
                name: "severity_task".into(),
                raw: "CRITICAL - recall trending".into(),
                agent: None,
            }],
            final_output: "Response posted".into(),
            error: None,
        });
        let outcome = controller(engine).run().await.unwrap();

        assert_eq!(outcome.status.status, RunPhase::Completed);
        assert_eq!(outcome.status.final_output.as_deref(), Some("Response posted"));
        assert_eq!(outcome.events.first().unwrap().kind, EventKind::System);
        assert_eq!(
            outcome.events.last().unwrap().message,
            "✅ Crew completed successfully"
        );
        assert!(outcome.events.iter().any(|e| e.kind == EventKind::FinalAnswer));

        // The step output overrides the inline parse.
        let severity = outcome.decisions.severity.unwrap();
        assert_eq!(severity.level, SeverityLevel::Critical);
        assert_eq!(severity.reasoning, "recall trending");
    }

    #[tokio::test]
    async fn test_second_start_while_running_conflicts() {
        let release = Arc::new(Notify::new());
        let ctl = controller(GateEngine {
            release: Arc::clone(&release),
        });

        let handle = ctl.start().unwrap();
        tokio::task::yield_now().await;
        let events_before = ctl.state().events().unwrap();

        let err = ctl.start().unwrap_err();
        assert!(matches!(err, RunError::AlreadyRunning));
        assert_eq!(ctl.state().events().unwrap(), events_before);
        assert!(ctl.state().status().unwrap().is_running());

        release.notify_one();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.status.status, RunPhase::Completed);

        // Finished runs can be followed by a new one.
        release.notify_one();
        assert!(ctl.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_engine_error_is_recorded() {
        let engine = ScriptedEngine::new(RunScript {
            trace: vec![
                "Agent: Crisis Severity Classifier\n".into(),
                "Final Answer: MODERATE\n".into(),
                "Agent: Brand Response Strategist\n".into(),
            ],
            error: Some("rate limit exceeded".into()),
            ..RunScript::default()
        });
        let outcome = controller(engine).run().await.unwrap();

        assert_eq!(outcome.status.status, RunPhase::Error);
        assert_eq!(
            outcome.status.final_output.as_deref(),
            Some("rate limit exceeded")
        );
        assert_eq!(outcome.error.as_deref(), Some("rate limit exceeded"));
        let last = outcome.events.last().unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert_eq!(last.message, "❌ Error: rate limit exceeded");
        // Inline decisions gathered before the failure survive.
        assert_eq!(
            outcome.decisions.severity.unwrap().level,
            SeverityLevel::Moderate
        );
    }

    #[tokio::test]
    async fn test_panicking_engine_ends_in_error() {
        let ctl = controller(PanicEngine);
        let outcome = ctl.run().await.unwrap();
        assert_eq!(outcome.status.status, RunPhase::Error);
        assert!(outcome.error.is_some());
        assert!(!ctl.state().status().unwrap().is_running());
    }
}
