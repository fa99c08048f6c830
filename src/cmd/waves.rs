//! Wave listing command (`crisis-relay waves`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crisis_relay::config::{CliOverrides, CrisisConfig};
use crisis_relay::feed::discover_waves;

pub fn cmd_waves(
    project_dir: PathBuf,
    config_file: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let overrides = CliOverrides {
        data_dir,
        ..CliOverrides::default()
    };
    let config = CrisisConfig::load(project_dir, config_file, &overrides)?;
    let data_dir = config.data_dir();

    let waves = discover_waves(&data_dir)
        .with_context(|| format!("Cannot list waves in {}", data_dir.display()))?;

    if waves.is_empty() {
        println!("No wave files found in {}", data_dir.display());
        return Ok(());
    }

    println!("Waves in {}:", data_dir.display());
    for wave in waves {
        let file_name = wave
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match wave.items {
            Ok(count) => println!("  wave {:>3}  {:<24} {} posts", wave.wave, file_name, count),
            Err(e) => println!("  wave {:>3}  {:<24} unreadable: {}", wave.wave, file_name, e),
        }
    }
    Ok(())
}
