use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use super::api::{self, AppState, SharedState};
use super::ws;
use crate::engine::{ScriptedEngine, UnconfiguredEngine, WorkflowEngine, default_script_path};
use crate::feed::{FeedQueue, FeedSettings, FileWaveLoader, WaveLoader};
use crate::response_log::ResponseLog;
use crate::runner::RunController;
use crate::state::RunState;
use crate::transducer::TransducerConfig;

/// Configuration for the dashboard server.
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub response_log: PathBuf,
    /// Recorded run replayed on `POST /run`; defaults to `<data_dir>/crew_run.json`
    pub script: Option<PathBuf>,
    /// Pause between replayed trace chunks
    pub script_chunk_delay: Duration,
    pub feed: FeedSettings,
    pub transducer: TransducerConfig,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("mock_data");
        Self {
            port: 8000,
            response_log: data_dir.join("crisis_log.json"),
            data_dir,
            script: None,
            script_chunk_delay: Duration::ZERO,
            feed: FeedSettings::default(),
            transducer: TransducerConfig::default(),
            dev_mode: false,
        }
    }
}

/// Build the full application router: REST API plus the two WebSockets.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .route("/ws/feed", get(ws::feed_ws_handler))
        .with_state(state)
}

/// Pick the workflow engine for `POST /run`.
fn resolve_engine(config: &ServerConfig) -> Result<Arc<dyn WorkflowEngine>> {
    let script = match &config.script {
        Some(path) => Some(path.clone()),
        None => {
            let fallback = default_script_path(&config.data_dir);
            fallback.exists().then_some(fallback)
        }
    };
    match script {
        Some(path) => {
            let engine = ScriptedEngine::load(&path)?.with_chunk_delay(config.script_chunk_delay);
            tracing::info!(script = %path.display(), "replaying recorded crew run");
            Ok(Arc::new(engine))
        }
        None => {
            tracing::warn!("no crew engine configured; POST /run will fail");
            Ok(Arc::new(UnconfiguredEngine))
        }
    }
}

pub fn build_state(config: &ServerConfig) -> Result<SharedState> {
    let engine = resolve_engine(config)?;
    let run_state = Arc::new(RunState::default());
    let loader: Arc<dyn WaveLoader> = Arc::new(FileWaveLoader::new(&config.data_dir));

    Ok(Arc::new(AppState {
        runner: RunController::new(Arc::clone(&run_state), engine, config.transducer.clone())
            .with_echo(config.dev_mode),
        run_state,
        feed: FeedQueue::new(Arc::clone(&loader), config.feed.clone()),
        loader,
        response_log: ResponseLog::new(&config.response_log),
    }))
}

/// Start the dashboard server and block until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if !config.data_dir.is_dir() {
        tracing::warn!(data_dir = %config.data_dir.display(), "data directory does not exist");
    }

    let state = build_state(&config)?;
    let feed = state.feed.clone();
    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, data_dir = %config.data_dir.display(), "crisis relay listening");
    println!("Crisis relay running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(feed))
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal(feed: FeedQueue) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
    // Live feed sockets end once their stream does.
    if let Err(e) = feed.stop() {
        tracing::warn!(error = %e, "could not stop live feed");
    }
}
