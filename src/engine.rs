//! Workflow engine seam.
//!
//! The crew itself (five LLM-backed roles run in sequence) is an external
//! collaborator. The relay only needs two things from it: a stream of raw
//! progress text, written into a [`TraceSink`], and the final result with
//! per-step outputs. [`WorkflowEngine`] captures exactly that.
//!
//! Real implementation: whatever drives the crew. Test double and offline
//! replay: [`ScriptedEngine`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Receives the engine's progress text in arbitrary chunks.
pub trait TraceSink: Send {
    fn write(&mut self, chunk: &str);

    /// End of trace. Pending partial lines and open captures are flushed.
    fn close(&mut self) {}
}

/// Forwards every chunk to stdout before passing it on.
pub struct EchoSink<S> {
    inner: S,
}

impl<S: TraceSink> EchoSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: TraceSink> TraceSink for EchoSink<S> {
    fn write(&mut self, chunk: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
        self.inner.write(chunk);
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Output of one crew task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepOutput {
    /// Task name, e.g. `severity_task`
    #[serde(default)]
    pub name: String,
    /// The task's raw final text
    #[serde(default)]
    pub raw: String,
    /// Role of the agent that ran the task, when the engine reports it
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineOutput {
    pub final_output: String,
    #[serde(default)]
    pub steps: Vec<StepOutput>,
}

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Run the whole crew once, writing progress into `sink`.
    async fn kickoff(&self, sink: &mut dyn TraceSink) -> Result<EngineOutput>;
}

/// A recorded crew run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunScript {
    /// Trace chunks, written in order
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepOutput>,
    #[serde(default)]
    pub final_output: String,
    /// When set, the run fails with this message after the trace is written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunScript {
    /// Parse a script file. JSON objects are full scripts; anything else is
    /// taken as a bare text trace with no step outputs.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim_start().starts_with('{') {
            return serde_json::from_str(contents).context("Failed to parse run script JSON");
        }
        Ok(Self {
            trace: vec![contents.to_string()],
            ..Self::default()
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run script: {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid run script: {}", path.display()))
    }
}

/// Replays a [`RunScript`] into the sink.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    script: RunScript,
    chunk_delay: Duration,
}

impl ScriptedEngine {
    pub fn new(script: RunScript) -> Self {
        Self {
            script,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(RunScript::load(path)?))
    }

    /// Pause between chunks, to make a replay look live on the dashboard.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[async_trait]
impl WorkflowEngine for ScriptedEngine {
    async fn kickoff(&self, sink: &mut dyn TraceSink) -> Result<EngineOutput> {
        for (i, chunk) in self.script.trace.iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            sink.write(chunk);
        }
        if let Some(message) = &self.script.error {
            bail!("{}", message);
        }
        Ok(EngineOutput {
            final_output: self.script.final_output.clone(),
            steps: self.script.steps.clone(),
        })
    }
}

/// Stand-in used when the server starts without a crew to drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEngine;

#[async_trait]
impl WorkflowEngine for UnconfiguredEngine {
    async fn kickoff(&self, _sink: &mut dyn TraceSink) -> Result<EngineOutput> {
        bail!("no crew engine configured")
    }
}

/// Default script location inside a data dir.
pub fn default_script_path(data_dir: &Path) -> PathBuf {
    data_dir.join("crew_run.json")
}
