//! Crisis response log.
//!
//! The drafter logs each published response as a single line of the form
//! `SEVERITY: <level> | RESPONSE: <text> | ACTION: <action taken>`. Entries
//! are kept as a pretty-printed JSON array on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseLogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub response: String,
    pub action: String,
}

impl ResponseLogEntry {
    /// Parse a pipe-separated `KEY: value` line. Keys are case-insensitive;
    /// a missing severity is `UNKNOWN`, other missing keys are empty.
    pub fn parse(line: &str) -> Self {
        let parts: HashMap<String, String> = line
            .split('|')
            .filter_map(|part| part.split_once(':'))
            .map(|(key, value)| (key.trim().to_uppercase(), value.trim().to_string()))
            .collect();

        let get = |key: &str| parts.get(key).cloned();
        Self {
            timestamp: Utc::now(),
            severity: get("SEVERITY").unwrap_or_else(|| "UNKNOWN".to_string()),
            response: get("RESPONSE").unwrap_or_default(),
            action: get("ACTION").unwrap_or_default(),
        }
    }
}

/// Append-only JSON file of response entries. Clones share one write lock.
#[derive(Debug, Clone)]
pub struct ResponseLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ResponseLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries. A missing or unreadable file reads as empty.
    pub async fn entries(&self) -> Vec<ResponseLogEntry> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "cannot read response log");
                }
                return Vec::new();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "response log is corrupt, treating as empty");
            Vec::new()
        })
    }

    /// Parse `line` and append it.
    pub async fn append_line(&self, line: &str) -> Result<ResponseLogEntry> {
        let entry = ResponseLogEntry::parse(line);
        self.append(entry.clone()).await?;
        Ok(entry)
    }

    pub async fn append(&self, entry: ResponseLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await;
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write response log: {}", self.path.display()))?;
        tracing::info!(severity = %entries[entries.len() - 1].severity, "response logged");
        Ok(())
    }
}
