//! WebSocket message types for the push channel.
//!
//! Defines the protocol between the relay and connected viewers. The
//! channel is one-directional in practice: viewers only listen, liveness is
//! handled with protocol-level ping/pong frames rather than application
//! messages.

use serde::{Deserialize, Serialize};

use crate::domain::ScanEvent;

/// All message types that can be sent from the relay to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once, immediately after the handshake completes.
    Connection(ConnectionMessage),

    /// A scan event fan-out.
    Barcode(BarcodeMessage),
}

/// Greeting sent when a viewer successfully connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMessage {
    pub message: String,
    pub timestamp: i64,
}

/// A broadcast scan event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeMessage {
    pub barcode: String,
    pub timestamp: i64,
}

impl ServerMessage {
    /// The greeting frame for a freshly connected viewer.
    pub fn connection_greeting() -> Self {
        ServerMessage::Connection(ConnectionMessage {
            message: "Connected to scanner server".to_string(),
            timestamp: crate::domain::epoch_millis(),
        })
    }

    /// Wrap a scan event for fan-out.
    pub fn barcode(event: &ScanEvent) -> Self {
        ServerMessage::Barcode(BarcodeMessage {
            barcode: event.barcode.clone(),
            timestamp: event.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_message_serializes_with_type_tag() {
        let msg = ServerMessage::Connection(ConnectionMessage {
            message: "Connected to scanner server".to_string(),
            timestamp: 1700000000000,
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connection""#));
        assert!(json.contains(r#""timestamp":1700000000000"#));
    }

    #[test]
    fn greeting_keeps_the_text_deployed_viewers_expect() {
        match ServerMessage::connection_greeting() {
            ServerMessage::Connection(greeting) => {
                assert_eq!(greeting.message, "Connected to scanner server");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn barcode_message_serializes_with_type_tag() {
        let event = ScanEvent {
            barcode: "ABC123".to_string(),
            timestamp: 1700000000000,
        };
        let json = serde_json::to_string(&ServerMessage::barcode(&event)).unwrap();

        assert!(json.contains(r#""type":"barcode""#));
        assert!(json.contains(r#""barcode":"ABC123""#));
    }

    #[test]
    fn barcode_message_round_trips_through_the_viewer_parser() {
        let json = r#"{"type":"barcode","barcode":"XYZ9","timestamp":42}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();

        match msg {
            ServerMessage::Barcode(b) => {
                assert_eq!(b.barcode, "XYZ9");
                assert_eq!(b.timestamp, 42);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn malformed_payload_is_a_parse_error_not_a_panic() {
        let result = serde_json::from_str::<ServerMessage>("not json");
        assert!(result.is_err());
    }
}
