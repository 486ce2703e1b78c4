//! The relay pipeline: decode an inbound payload, fan it out.

use std::sync::Arc;

use tracing::info;

use crate::adapters::websocket::{BroadcastEngine, ServerMessage, SessionRegistry};
use crate::domain::{ScanEvent, ScanPayload};

/// What the ingress reports back to the scanner.
#[derive(Debug, Clone)]
pub struct ScanReceipt {
    pub barcode: String,
    pub delivered: usize,
    pub clients: usize,
}

/// Decode + broadcast, shared by every ingress endpoint.
pub struct RelayService {
    registry: Arc<SessionRegistry>,
    engine: BroadcastEngine,
}

impl RelayService {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        let engine = BroadcastEngine::new(registry.clone());
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Normalize a scanner payload and broadcast it to every open session.
    ///
    /// Never fails: decoding always produces an event, and per-session
    /// delivery failures are absorbed by the broadcast engine. A scan that
    /// arrives with zero connected viewers is dropped by design — the relay
    /// is live-operations only, with no buffering.
    pub async fn ingest(&self, payload: ScanPayload) -> ScanReceipt {
        let event = ScanEvent::decode(payload);
        info!(barcode = %event.barcode, viewers = self.registry.len(), "scan received");

        let outcome = self.engine.broadcast(&ServerMessage::barcode(&event)).await;

        ScanReceipt {
            barcode: event.barcode,
            delivered: outcome.delivered,
            clients: self.registry.len(),
        }
    }
}
