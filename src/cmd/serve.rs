//! Dashboard server command (`crisis-relay serve`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crisis_relay::config::{CliOverrides, CrisisConfig};
use crisis_relay::dashboard::{ServerConfig, start_server};

pub async fn cmd_serve(
    project_dir: PathBuf,
    config_file: Option<&Path>,
    overrides: &CliOverrides,
    script: Option<PathBuf>,
    chunk_delay_ms: u64,
) -> Result<()> {
    let config = CrisisConfig::load(project_dir, config_file, overrides)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    start_server(ServerConfig {
        port: config.toml.server.port,
        data_dir: config.data_dir(),
        response_log: config.response_log_path(),
        script,
        script_chunk_delay: Duration::from_millis(chunk_delay_ms),
        feed: config.feed_settings(),
        transducer: config.transducer().clone(),
        dev_mode: config.toml.server.dev_mode,
    })
    .await
}
