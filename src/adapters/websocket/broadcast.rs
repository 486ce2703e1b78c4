//! Fan-out of scan events to every connected viewer.
//!
//! Broadcast is best-effort and at-most-once per session: a per-session
//! delivery failure is counted and the session pruned, but it never aborts
//! delivery to the remaining sessions and never surfaces to the scanner.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::messages::ServerMessage;
use super::registry::SessionRegistry;

/// Result of one broadcast pass, for logging and the ingress response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Sessions the frame was handed to.
    pub delivered: usize,
    /// Sessions whose transport refused the frame (pruned).
    pub failed: usize,
}

/// Delivers serialized frames to every live session in the registry.
pub struct BroadcastEngine {
    registry: Arc<SessionRegistry>,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to every open session.
    ///
    /// The frame is serialized once and shared across sessions. Failed
    /// sessions are removed from the registry so no later broadcast is
    /// attempted against them; there is no per-send retry — the next scan
    /// is the next opportunity.
    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastOutcome {
        // ServerMessage contains nothing unserializable.
        let frame: Arc<str> = match serde_json::to_string(message) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast frame");
                return BroadcastOutcome {
                    delivered: 0,
                    failed: 0,
                };
            }
        };

        let mut delivered = 0;
        let mut failed = 0;

        for session in self.registry.snapshot().await {
            if !session.is_open() {
                continue;
            }
            if session.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                failed += 1;
                debug!(session_id = %session.id(), "delivery failed, pruning session");
                self.registry.remove(&session.id()).await;
            }
        }

        info!(delivered, failed, "broadcast complete");
        BroadcastOutcome { delivered, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::registry::{Outbound, SessionHandle, SessionId};
    use tokio::sync::mpsc;

    fn healthy_session() -> (Arc<SessionHandle>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(SessionHandle::new(SessionId::new(), tx)), rx)
    }

    fn dead_session() -> Arc<SessionHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        Arc::new(SessionHandle::new(SessionId::new(), tx))
    }

    fn barcode_message() -> ServerMessage {
        ServerMessage::barcode(&crate::domain::ScanEvent {
            barcode: "ABC123".to_string(),
            timestamp: 1700000000000,
        })
    }

    #[tokio::test]
    async fn delivers_to_every_open_session() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());

        let (a, mut a_rx) = healthy_session();
        let (b, mut b_rx) = healthy_session();
        registry.add(a).await;
        registry.add(b).await;

        let outcome = engine.broadcast(&barcode_message()).await;

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 0);
        assert!(matches!(a_rx.recv().await, Some(Outbound::Frame(_))));
        assert!(matches!(b_rx.recv().await, Some(Outbound::Frame(_))));
    }

    #[tokio::test]
    async fn failing_transport_does_not_abort_the_batch() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());

        let (healthy, mut healthy_rx) = healthy_session();
        registry.add(dead_session()).await;
        registry.add(healthy).await;
        registry.add(dead_session()).await;

        let outcome = engine.broadcast(&barcode_message()).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 2);
        assert!(matches!(healthy_rx.recv().await, Some(Outbound::Frame(_))));
    }

    #[tokio::test]
    async fn failed_sessions_are_pruned_from_the_registry() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());

        let (healthy, _healthy_rx) = healthy_session();
        registry.add(healthy).await;
        registry.add(dead_session()).await;
        assert_eq!(registry.len(), 2);

        engine.broadcast(&barcode_message()).await;

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_with_no_sessions_is_a_noop() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry);

        let outcome = engine.broadcast(&barcode_message()).await;

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn frame_is_serialized_once_and_shared() {
        let registry = Arc::new(SessionRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());

        let (a, mut a_rx) = healthy_session();
        let (b, mut b_rx) = healthy_session();
        registry.add(a).await;
        registry.add(b).await;

        engine.broadcast(&barcode_message()).await;

        let frame_a = match a_rx.recv().await {
            Some(Outbound::Frame(f)) => f,
            other => panic!("unexpected outbound: {:?}", other),
        };
        let frame_b = match b_rx.recv().await {
            Some(Outbound::Frame(f)) => f,
            other => panic!("unexpected outbound: {:?}", other),
        };
        assert!(Arc::ptr_eq(&frame_a, &frame_b));
    }
}
