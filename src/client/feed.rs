//! Viewer-side channel driver.
//!
//! [`ScanFeed`] keeps one logical WebSocket to the relay alive, parses the
//! typed frames into [`FeedEvent`]s for a consumer (a TUI, a bridge, a
//! test), and runs the reconnect schedule from [`super::reconnect`] when
//! the channel drops. Exactly one retry timer is pending at any moment; a
//! shutdown or manual-reconnect request cancels it via the select below.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::adapters::websocket::ServerMessage;
use crate::domain::ScanEvent;

use super::reconnect::{ReconnectContext, ReconnectDecision};

/// How long a handshake may take before it counts as a lost connection.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the feed reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Channel established (initially or after a reconnect).
    Connected,
    /// A scan arrived.
    Scan(ScanEvent),
    /// Channel lost; retrying after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries exhausted; the feed is idle until a manual reconnect.
    Failed,
}

/// Connection-level failures while establishing the channel.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error("handshake timed out after {HANDSHAKE_TIMEOUT:?}")]
    HandshakeTimeout,
}

#[derive(Debug)]
enum Control {
    Shutdown,
    ReconnectNow,
}

/// Remote control for a running feed.
pub struct ScanFeedHandle {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl ScanFeedHandle {
    /// Reset the attempt counter and reconnect immediately, even out of
    /// the failed state.
    pub fn reconnect_now(&self) {
        let _ = self.control.send(Control::ReconnectNow);
    }

    /// Tear the channel down intentionally and wait for the driver to
    /// finish. Never triggers a reconnect attempt.
    pub async fn shutdown(self) {
        let _ = self.control.send(Control::Shutdown);
        let _ = self.task.await;
    }
}

/// The feed itself; construct with [`ScanFeed::spawn`].
pub struct ScanFeed;

impl ScanFeed {
    /// Spawn a feed driver for `url` with the default reconnect schedule.
    pub fn spawn(url: impl Into<String>) -> (ScanFeedHandle, mpsc::UnboundedReceiver<FeedEvent>) {
        Self::spawn_with_context(url, ReconnectContext::default())
    }

    /// Spawn with a custom reconnect schedule (shorter in tests).
    pub fn spawn_with_context(
        url: impl Into<String>,
        context: ReconnectContext,
    ) -> (ScanFeedHandle, mpsc::UnboundedReceiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let url = url.into();

        let task = tokio::spawn(run(url, context, event_tx, control_rx));

        (
            ScanFeedHandle {
                control: control_tx,
                task,
            },
            event_rx,
        )
    }
}

async fn connect(url: &str) -> Result<WsStream, FeedError> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(FeedError::Handshake(e)),
        Err(_elapsed) => Err(FeedError::HandshakeTimeout),
    }
}

/// Outcome of one established-connection pump.
enum PumpExit {
    /// Transport closed or errored.
    Lost,
    /// Consumer asked for teardown.
    Shutdown,
    /// Consumer asked for an immediate fresh connection.
    Manual,
}

async fn run(
    url: String,
    mut ctx: ReconnectContext,
    events: mpsc::UnboundedSender<FeedEvent>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    loop {
        if !ctx.begin_connect() {
            // Only reachable through a state bug; bail rather than spin.
            warn!(state = ?ctx.state(), "connect requested in non-connectable state");
            return;
        }

        debug!(%url, attempt = ctx.attempts(), "connecting to relay");
        match connect(&url).await {
            Ok(stream) => {
                ctx.connected();
                info!(%url, "channel open");
                let _ = events.send(FeedEvent::Connected);

                match pump(stream, &events, &mut control).await {
                    PumpExit::Shutdown => {
                        ctx.close_intentional();
                        return;
                    }
                    PumpExit::Manual => {
                        ctx.manual_reconnect();
                        continue;
                    }
                    PumpExit::Lost => {}
                }
            }
            Err(e) => {
                warn!(%url, error = %e, "connection attempt failed");
            }
        }

        match ctx.connection_lost() {
            ReconnectDecision::Retry { attempt, delay } => {
                info!(attempt, ?delay, "scheduling reconnect");
                let _ = events.send(FeedEvent::Reconnecting { attempt, delay });

                // The sole pending retry timer; a control message replaces it.
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    ctrl = control.recv() => match ctrl {
                        Some(Control::ReconnectNow) => ctx.manual_reconnect(),
                        Some(Control::Shutdown) | None => {
                            ctx.close_intentional();
                            return;
                        }
                    },
                }
            }
            ReconnectDecision::GiveUp => {
                warn!(%url, "reconnect attempts exhausted");
                let _ = events.send(FeedEvent::Failed);

                // Terminal until the consumer intervenes.
                loop {
                    match control.recv().await {
                        Some(Control::ReconnectNow) => {
                            ctx.manual_reconnect();
                            break;
                        }
                        Some(Control::Shutdown) | None => {
                            ctx.close_intentional();
                            return;
                        }
                    }
                }
            }
            ReconnectDecision::Suppressed => return,
        }
    }
}

/// Pump an open channel until it drops or the consumer intervenes.
async fn pump(
    stream: WsStream,
    events: &mpsc::UnboundedSender<FeedEvent>,
    control: &mut mpsc::UnboundedReceiver<Control>,
) -> PumpExit {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            ctrl = control.recv() => match ctrl {
                Some(Control::ReconnectNow) => {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return PumpExit::Manual;
                }
                Some(Control::Shutdown) | None => {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return PumpExit::Shutdown;
                }
            },

            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => handle_frame(&text, events),
                Some(Ok(tungstenite::Message::Ping(payload))) => {
                    let _ = write.send(tungstenite::Message::Pong(payload)).await;
                }
                Some(Ok(tungstenite::Message::Close(_))) => {
                    debug!("relay closed the channel");
                    return PumpExit::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "channel error");
                    return PumpExit::Lost;
                }
                None => return PumpExit::Lost,
            },
        }
    }
}

/// Parse one inbound frame. Malformed payloads are logged and dropped
/// without touching the channel state.
fn handle_frame(text: &str, events: &mpsc::UnboundedSender<FeedEvent>) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Barcode(frame)) => {
            let _ = events.send(FeedEvent::Scan(ScanEvent {
                barcode: frame.barcode,
                timestamp: frame.timestamp,
            }));
        }
        Ok(ServerMessage::Connection(greeting)) => {
            debug!(message = %greeting.message, "relay greeting");
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
        }
    }
}
