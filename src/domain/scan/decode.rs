//! Normalizes heterogeneous scanner payloads into a [`ScanEvent`].
//!
//! Hardware scanners are configured in the field and send whatever their
//! firmware likes: plain text, `{"barcode": ...}`, `{"data": ...}`, raw
//! bytes, or something else entirely. Decoding therefore never fails — a
//! malformed payload must never block the device integration, so the chain
//! always bottoms out in a fallback that serializes the whole value.

use bytes::Bytes;
use serde_json::Value;

use super::event::ScanEvent;

/// An inbound scanner payload before normalization.
///
/// The ingress constructs the variant from the request body and content
/// type; the decoder does not look at HTTP at all.
#[derive(Debug, Clone)]
pub enum ScanPayload {
    /// Plain-text body.
    Text(String),
    /// Parsed JSON body of any shape.
    Json(Value),
    /// Raw byte body (binary content types, or anything unparseable).
    Bytes(Bytes),
}

impl ScanEvent {
    /// Decode a payload into a scan event. First match wins:
    ///
    /// 1. plain string body
    /// 2. JSON string
    /// 3. JSON object with a string `barcode` field
    /// 4. JSON object with a string `data` field
    /// 5. raw bytes, decoded as UTF-8 (lossy)
    /// 6. fallback: serialize the whole JSON value
    ///
    /// Resolved values are trimmed of surrounding whitespace.
    pub fn decode(payload: ScanPayload) -> ScanEvent {
        let barcode = match payload {
            ScanPayload::Text(s) => s.trim().to_string(),
            ScanPayload::Json(value) => decode_json(value),
            ScanPayload::Bytes(b) => String::from_utf8_lossy(&b).trim().to_string(),
        };
        ScanEvent::new(barcode)
    }
}

fn decode_json(value: Value) -> String {
    match &value {
        Value::String(s) => return s.trim().to_string(),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("barcode") {
                return s.trim().to_string();
            }
            if let Some(Value::String(s)) = map.get("data") {
                return s.trim().to_string();
            }
        }
        _ => {}
    }

    // Unknown shape: keep the whole thing so nothing is silently lost.
    // Value -> String serialization cannot fail.
    serde_json::to_string(&value).unwrap_or_default()
}
