use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "crisis-relay")]
#[command(
    version,
    about = "Crisis-response crew relay: trace-to-event transducer and simulated live feed"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Config file to use instead of <project-dir>/crisis.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the dashboard API and live feed server
    ///
    /// Cross-origin requests are refused unless --dev is set. A dashboard
    /// hosted on a different origin (another port counts) needs --dev or
    /// `dev_mode = true` under [server] in crisis.toml.
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the wave files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Milliseconds between live feed posts
        #[arg(long)]
        cadence_ms: Option<u64>,

        /// Recorded crew run to replay on POST /run
        #[arg(long)]
        script: Option<PathBuf>,

        /// Milliseconds between replayed trace chunks
        #[arg(long, default_value = "0")]
        chunk_delay_ms: u64,

        /// Dev mode: allow any CORS origin, bind 0.0.0.0 and echo the trace.
        /// Without it only same-origin dashboards can call the API
        #[arg(long)]
        dev: bool,
    },
    /// Run a recorded trace through the transducer and print the result
    Replay {
        /// Run script (JSON) or bare text trace
        trace: PathBuf,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List wave files and their item counts
    Waves {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default crisis.toml file
    Init,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("crisis_relay=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crisis_relay=info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config_file = cli.config.as_deref();

    match &cli.command {
        Commands::Serve {
            port,
            data_dir,
            cadence_ms,
            script,
            chunk_delay_ms,
            dev,
        } => {
            let overrides = crisis_relay::config::CliOverrides {
                port: *port,
                data_dir: data_dir.clone(),
                cadence_ms: *cadence_ms,
                dev_mode: *dev,
            };
            cmd::cmd_serve(
                project_dir,
                config_file,
                &overrides,
                script.clone(),
                *chunk_delay_ms,
            )
            .await?;
        }
        Commands::Replay { trace, json } => {
            cmd::cmd_replay(project_dir, config_file, trace, *json).await?;
        }
        Commands::Waves { data_dir } => {
            cmd::cmd_waves(project_dir, config_file, data_dir.clone())?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(project_dir, config_file, command.clone())?;
        }
    }

    Ok(())
}
