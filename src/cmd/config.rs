//! Configuration view and validation commands (`crisis-relay config`).

use std::path::{Path, PathBuf};

use anyhow::Result;
use crisis_relay::config::{CONFIG_FILE_NAME, CliOverrides, CrisisConfig, CrisisToml};

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: PathBuf,
    config_file: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Crisis Relay Configuration");
            println!("==========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No crisis.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            // Effective values include env overrides
            let config = CrisisConfig::load(
                project_dir,
                config_path.exists().then_some(config_path.as_path()),
                &CliOverrides::default(),
            )?;
            let toml = &config.toml;

            println!("[server]");
            println!("  port = {}", toml.server.port);
            println!("  dev_mode = {}", toml.server.dev_mode);
            println!();

            println!("[feed]");
            println!("  data_dir = \"{}\"", config.data_dir().display());
            println!("  cadence_ms = {}", toml.feed.cadence_ms);
            println!("  idle_timeout_ms = {}", toml.feed.idle_timeout_ms);
            println!("  settle_ms = {}", toml.feed.settle_ms);
            println!("  initial_wave = {}", toml.feed.initial_wave);
            println!("  response_log = \"{}\"", config.response_log_path().display());
            println!();

            println!("[transducer]");
            println!("  noise_patterns = {:?}", toml.transducer.noise_patterns);
            for entry in &toml.transducer.speakers {
                println!(
                    "  {} <- {:?}",
                    entry.speaker.display_name(),
                    entry.patterns
                );
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = CrisisConfig::load(
                project_dir,
                config_path.exists().then_some(config_path.as_path()),
                &CliOverrides::default(),
            )?;
            if !config_path.exists() {
                println!("No crisis.toml found. Checking defaults.");
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("crisis.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            CrisisToml::default().save(&config_path)?;

            println!("Created crisis.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] port, dev_mode");
            println!("  - [feed] data_dir, cadence_ms, initial_wave");
            println!("  - [[transducer.speakers]] role patterns");
            println!();
        }
    }

    Ok(())
}
