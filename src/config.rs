//! Layered configuration for the crisis relay.
//!
//! Settings are read from `crisis.toml` in the project directory, then
//! overridden by environment variables, then by CLI flags. A missing file is
//! not an error; every field has a default.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8000
//! dev_mode = false
//!
//! [feed]
//! data_dir = "mock_data"
//! cadence_ms = 3000
//! idle_timeout_ms = 1000
//! settle_ms = 200
//! initial_wave = 1
//!
//! [transducer]
//! noise_patterns = ["LiteLLM", "HTTP Request:"]
//!
//! [[transducer.speakers]]
//! speaker = "monitor"
//! patterns = ["Social Media Monitor", "Monitor Agent"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::FeedSettings;
use crate::transducer::TransducerConfig;

pub const CONFIG_FILE_NAME: &str = "crisis.toml";

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind 0.0.0.0 and allow any origin (for a local UI dev server)
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev_mode: false,
        }
    }
}

/// Simulated feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSection {
    /// Folder holding `tweets.json`, `tweets_wave2.json`, ...
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Pause between successive posts
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    /// Upper bound on how long an idle stream waits before re-checking `running`
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Handoff delay between stopping an old subscription and re-seeding
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_initial_wave")]
    pub initial_wave: u32,
    /// Response log file; defaults to `<data_dir>/crisis_log.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_log: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("mock_data")
}

fn default_cadence_ms() -> u64 {
    3000
}

fn default_idle_timeout_ms() -> u64 {
    1000
}

fn default_settle_ms() -> u64 {
    200
}

fn default_initial_wave() -> u32 {
    1
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cadence_ms: default_cadence_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            settle_ms: default_settle_ms(),
            initial_wave: default_initial_wave(),
            response_log: None,
        }
    }
}

/// The complete crisis.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrisisToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub transducer: TransducerConfig,
}

impl CrisisToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse crisis.toml")
    }

    /// Load `crisis.toml` from `dir`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize crisis.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("CRISIS_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("CRISIS_DATA_DIR").filter(|v| !v.is_empty()) {
            self.feed.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("CRISIS_CADENCE_MS").and_then(|v| v.parse().ok()) {
            self.feed.cadence_ms = ms;
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub cadence_ms: Option<u64>,
    pub dev_mode: bool,
}

/// Resolved runtime configuration (file → environment → CLI).
#[derive(Debug, Clone)]
pub struct CrisisConfig {
    pub project_dir: PathBuf,
    pub toml: CrisisToml,
}

impl CrisisConfig {
    /// Resolve configuration for `project_dir`. `config_file` replaces the
    /// default `crisis.toml` lookup when given.
    pub fn load(
        project_dir: PathBuf,
        config_file: Option<&Path>,
        cli: &CliOverrides,
    ) -> Result<Self> {
        let mut toml = match config_file {
            Some(path) => CrisisToml::load(path)?,
            None => CrisisToml::load_or_default(&project_dir)?,
        };
        toml.apply_env(|key| std::env::var(key).ok());

        let mut config = Self { project_dir, toml };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.toml.server.port = port;
        }
        if let Some(ref dir) = cli.data_dir {
            self.toml.feed.data_dir = dir.clone();
        }
        if let Some(ms) = cli.cadence_ms {
            self.toml.feed.cadence_ms = ms;
        }
        if cli.dev_mode {
            self.toml.server.dev_mode = true;
        }
    }

    /// Data directory, resolved against the project directory when relative.
    pub fn data_dir(&self) -> PathBuf {
        let dir = &self.toml.feed.data_dir;
        if dir.is_absolute() {
            dir.clone()
        } else {
            self.project_dir.join(dir)
        }
    }

    pub fn response_log_path(&self) -> PathBuf {
        match self.toml.feed.response_log {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.project_dir.join(path),
            None => self.data_dir().join("crisis_log.json"),
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        let feed = &self.toml.feed;
        FeedSettings {
            cadence: Duration::from_millis(feed.cadence_ms),
            idle_timeout: Duration::from_millis(feed.idle_timeout_ms),
            settle_delay: Duration::from_millis(feed.settle_ms),
            initial_wave: feed.initial_wave,
        }
    }

    pub fn transducer(&self) -> &TransducerConfig {
        &self.toml.transducer
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let feed = &self.toml.feed;

        if feed.cadence_ms == 0 {
            warnings.push("feed.cadence_ms is 0: the feed will emit posts back-to-back".to_string());
        }
        if feed.idle_timeout_ms == 0 {
            warnings.push(
                "feed.idle_timeout_ms is 0: an idle stream will spin instead of waiting".to_string(),
            );
        }
        if feed.initial_wave == 0 {
            warnings.push("feed.initial_wave is 0: waves are numbered from 1".to_string());
        }
        if !self.data_dir().exists() {
            warnings.push(format!(
                "feed.data_dir {} does not exist: every wave will report not found",
                self.data_dir().display()
            ));
        }

        let transducer = &self.toml.transducer;
        if transducer.speakers.is_empty() {
            warnings.push(
                "transducer.speakers is empty: every event will be attributed to System".to_string(),
            );
        }
        for entry in &transducer.speakers {
            if entry.patterns.iter().all(|p| p.trim().is_empty()) {
                warnings.push(format!(
                    "transducer.speakers entry for '{}' has no usable patterns",
                    entry.speaker.as_str()
                ));
            }
        }
        for pattern in &transducer.noise_patterns {
            if pattern.trim().is_empty() {
                warnings.push("transducer.noise_patterns contains an empty pattern; it would drop every line".to_string());
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisis_common::Speaker;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let toml = CrisisToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.server.port, 8000);
        assert_eq!(toml.feed.cadence_ms, 3000);
        assert_eq!(toml.feed.idle_timeout_ms, 1000);
        assert_eq!(toml.feed.initial_wave, 1);
        assert_eq!(toml.transducer.speakers.len(), 5);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let toml = CrisisToml::parse(
            r#"
            [feed]
            cadence_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(toml.feed.cadence_ms, 50);
        assert_eq!(toml.feed.idle_timeout_ms, 1000);
        assert_eq!(toml.server.port, 8000);
    }

    #[test]
    fn test_parse_custom_speakers() {
        let toml = CrisisToml::parse(
            r#"
            [[transducer.speakers]]
            speaker = "severity"
            patterns = ["Triage"]
            "#,
        )
        .unwrap();
        assert_eq!(toml.transducer.speakers.len(), 1);
        assert_eq!(toml.transducer.speakers[0].speaker, Speaker::Severity);
        assert_eq!(toml.transducer.speakers[0].patterns, vec!["Triage"]);
    }

    #[test]
    fn test_parse_invalid_toml_fails() {
        assert!(CrisisToml::parse("[feed\ncadence_ms = ").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut toml = CrisisToml::default();
        let env: HashMap<&str, &str> = [
            ("CRISIS_PORT", "9100"),
            ("CRISIS_DATA_DIR", "/srv/fixtures"),
            ("CRISIS_CADENCE_MS", "10"),
        ]
        .into_iter()
        .collect();
        toml.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(toml.server.port, 9100);
        assert_eq!(toml.feed.data_dir, PathBuf::from("/srv/fixtures"));
        assert_eq!(toml.feed.cadence_ms, 10);
    }

    #[test]
    fn test_env_ignores_unparseable_values() {
        let mut toml = CrisisToml::default();
        toml.apply_env(|k| (k == "CRISIS_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(toml.server.port, 8000);
    }

    #[test]
    fn test_cli_overrides_everything() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[server]\nport = 9000\n[feed]\ncadence_ms = 500\n",
        )
        .unwrap();
        let mut config = CrisisConfig {
            project_dir: dir.path().to_path_buf(),
            toml: CrisisToml::load_or_default(dir.path()).unwrap(),
        };
        config.apply_cli(&CliOverrides {
            port: Some(7000),
            cadence_ms: None,
            data_dir: Some(PathBuf::from("fixtures")),
            dev_mode: true,
        });
        assert_eq!(config.toml.server.port, 7000);
        assert_eq!(config.toml.feed.cadence_ms, 500);
        assert!(config.toml.server.dev_mode);
        assert_eq!(config.data_dir(), dir.path().join("fixtures"));
    }

    #[test]
    fn test_response_log_defaults_into_data_dir() {
        let config = CrisisConfig {
            project_dir: PathBuf::from("/proj"),
            toml: CrisisToml::default(),
        };
        assert_eq!(
            config.response_log_path(),
            PathBuf::from("/proj/mock_data/crisis_log.json")
        );
    }

    #[test]
    fn test_feed_settings_conversion() {
        let config = CrisisConfig {
            project_dir: PathBuf::from("."),
            toml: CrisisToml::default(),
        };
        let settings = config.feed_settings();
        assert_eq!(settings.cadence, Duration::from_secs(3));
        assert_eq!(settings.idle_timeout, Duration::from_secs(1));
        assert_eq!(settings.initial_wave, 1);
    }

    #[test]
    fn test_validate_flags_zero_cadence_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        let mut toml = CrisisToml::default();
        toml.feed.cadence_ms = 0;
        let config = CrisisConfig {
            project_dir: dir.path().to_path_buf(),
            toml,
        };
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("cadence_ms")));
        assert!(warnings.iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut toml = CrisisToml::default();
        toml.server.port = 8123;
        toml.save(&path).unwrap();
        let loaded = CrisisToml::load(&path).unwrap();
        assert_eq!(loaded.server.port, 8123);
        assert_eq!(loaded.transducer.speakers.len(), 5);
    }
}
