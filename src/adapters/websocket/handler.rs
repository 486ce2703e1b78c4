//! WebSocket upgrade handler for viewer connections.
//!
//! Handles the HTTP → WebSocket upgrade and the connection lifecycle:
//! 1. Upgrade at the server root
//! 2. Register the session and send the greeting frame
//! 3. Pump outbound frames / heartbeat pings / inbound frames until the
//!    transport closes or errors
//! 4. Remove the session from the registry
//!
//! The 30s heartbeat interval is owned by the connection task, so every
//! exit path (close frame, receive error, send failure, shutdown request)
//! tears it down with the task. A probe can never outlive its session.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::messages::ServerMessage;
use super::registry::{Outbound, SessionHandle, SessionId, SessionRegistry};
use crate::adapters::http::AppState;

/// How often each session is probed with a protocol ping.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Handle WebSocket upgrade requests at the server root.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Run an established viewer connection to completion.
async fn handle_socket(socket: WebSocket, registry: Arc<SessionRegistry>) {
    let (mut sender, mut receiver) = socket.split();

    let id = SessionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let handle = Arc::new(SessionHandle::new(id, outbound_tx));

    registry.add(handle.clone()).await;
    info!(session_id = %id, viewers = registry.len(), "viewer connected");

    // Greeting goes out before anything else; if even that fails the
    // viewer is already gone.
    let greeting = ServerMessage::connection_greeting();
    if let Ok(json) = serde_json::to_string(&greeting) {
        if sender.send(Message::Text(json)).await.is_err() {
            debug!(session_id = %id, "viewer disconnected before greeting");
            registry.remove(&id).await;
            return;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // An interval fires immediately on creation; the viewer was just
    // greeted, so skip that tick.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        debug!(session_id = %id, "send failed, closing session");
                        break;
                    }
                }
                Some(Outbound::Close) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                // All senders gone; nothing left to deliver.
                None => break,
            },

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!(session_id = %id, "heartbeat probe failed, closing session");
                    break;
                }
            }

            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Pong(_))) => {
                    handle.touch_pong();
                    debug!(session_id = %id, "heartbeat pong");
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(session_id = %id, "viewer sent close frame");
                    break;
                }
                // Viewers have no application messages to send; protocol
                // pings are answered by axum automatically.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %id, error = %e, "receive error");
                    break;
                }
                None => break,
            },
        }
    }

    // Single teardown point for every exit path above.
    registry.remove(&id).await;
    info!(session_id = %id, viewers = registry.len(), "viewer disconnected");
}
