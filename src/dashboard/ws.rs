use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use crisis_common::{DecisionLedger, Event, FeedItem, RunStatus};
use futures_util::{Sink, SinkExt, Stream, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::api::SharedState;
use crate::feed::FeedQueue;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    AgentEvent { event: Event },
    DecisionsUpdated { decisions: DecisionLedger },
    RunStatusChanged { status: RunStatus },
}

// ── Run-state socket ─────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let rx = state.run_state.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<String>) {
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx).await;
}

/// Forward broadcast messages with ping/pong keepalive.
///
/// If no Pong arrives within [`PONG_TIMEOUT`] after a Ping, the connection
/// is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut keepalive = Keepalive::new().await;

    loop {
        tokio::select! {
            _ = keepalive.interval.tick() => {
                if !keepalive.ping(&mut sender).await {
                    break;
                }
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "ws subscriber lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                if !keepalive.on_client_message(msg) {
                    break;
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Live feed socket ─────────────────────────────────────────────────

/// Each new subscriber restarts the feed from the initial wave.
pub async fn feed_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let feed = state.feed.clone();
    ws.on_upgrade(move |socket| handle_feed_socket(socket, feed))
}

async fn handle_feed_socket(socket: WebSocket, feed: FeedQueue) {
    let (mut sender, receiver) = socket.split();

    let items = match feed.subscribe().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "cannot start live feed");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let generation = items.generation();
    tracing::info!(generation, "feed subscriber attached");

    run_feed_loop(&mut sender, items, receiver, &feed, generation).await;
    let _ = sender.send(Message::Close(None)).await;
}

/// Forward feed items until the stream ends or the client goes away, then
/// stop the feed if `generation` is still the live one.
async fn run_feed_loop<S, I, C>(
    sender: &mut S,
    mut items: I,
    mut client: C,
    feed: &FeedQueue,
    generation: u64,
) where
    S: Sink<Message> + Unpin,
    I: Stream<Item = FeedItem> + Unpin,
    C: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut keepalive = Keepalive::new().await;

    loop {
        tokio::select! {
            _ = keepalive.interval.tick() => {
                if !keepalive.ping(sender).await {
                    break;
                }
            }

            item = items.next() => {
                let Some(item) = item else {
                    break;
                };
                if !send_item(sender, &item).await {
                    break;
                }
            }

            msg = client.next() => {
                if !keepalive.on_client_message(msg) {
                    break;
                }
            }
        }
    }

    match feed.stop_generation(generation) {
        Ok(true) => tracing::info!(generation, "feed subscriber left, feed stopped"),
        Ok(false) => tracing::debug!(generation, "feed subscriber left after restart"),
        Err(e) => tracing::warn!(error = %e, "could not stop feed"),
    }
}

async fn send_item<S>(sender: &mut S, item: &FeedItem) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(item) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, id = %item.id, "skipping unserializable feed item");
            true
        }
    }
}

// ── Keepalive ────────────────────────────────────────────────────────

struct Keepalive {
    interval: tokio::time::Interval,
    last_pong: Instant,
    awaiting_pong: bool,
}

impl Keepalive {
    async fn new() -> Self {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        Self {
            interval,
            last_pong: Instant::now(),
            awaiting_pong: false,
        }
    }

    /// Send a Ping. False when the peer is gone or missed the last Pong.
    async fn ping<S>(&mut self, sender: &mut S) -> bool
    where
        S: Sink<Message> + Unpin,
    {
        if self.awaiting_pong && self.last_pong.elapsed() > PONG_TIMEOUT {
            return false;
        }
        if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
            return false;
        }
        self.awaiting_pong = true;
        true
    }

    /// Track Pongs. False when the client closed or errored.
    fn on_client_message(&mut self, msg: Option<Result<Message, axum::Error>>) -> bool {
        match msg {
            Some(Ok(Message::Pong(_))) => {
                self.last_pong = Instant::now();
                self.awaiting_pong = false;
                true
            }
            Some(Ok(Message::Close(_))) | None => false,
            // Text, Binary and Ping from the client are ignored.
            Some(Ok(_)) => true,
            Some(Err(_)) => false,
        }
    }
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to all connected WebSocket clients.
/// Returns silently even if no clients are connected.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json); // no receivers is fine
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize ws message");
        }
    }
}
