//! Typed error hierarchy for the crisis relay.
//!
//! Two top-level enums cover the two stateful subsystems:
//! - `RunError`: run controller start/finish failures
//! - `FeedError`: wave loading and feed queue failures
//!
//! Parsing never produces an error: the transducer drops lines it does not
//! recognise and the decision extractor falls back to default values.

use crisis_common::RunPhase;
use thiserror::Error;

/// Errors from the run controller.
#[derive(Debug, Error)]
pub enum RunError {
    /// A run is already in flight. Reported as a conflict; no state changed.
    #[error("A crew run is already in progress")]
    AlreadyRunning,

    /// `complete`/`fail` outside a running run, or a second finish.
    #[error("Invalid run status transition: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("Run state lock poisoned")]
    LockPoisoned,

    #[error("Run task aborted: {0}")]
    Join(#[source] tokio::task::JoinError),
}

/// Errors from the feed subsystem.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read wave file at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse wave file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Feed queue lock poisoned")]
    LockPoisoned,
}
