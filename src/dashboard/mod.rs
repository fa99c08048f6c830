//! Dashboard surface: REST API, run-state WebSocket and live feed WebSocket.

pub mod api;
pub mod server;
pub mod ws;

pub use server::{ServerConfig, build_router, build_state, start_server};
