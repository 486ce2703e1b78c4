//! The canonical scan event.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds.
///
/// All timestamps on the wire are integer epoch-millis; this is the single
/// place they come from.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A single barcode scan, normalized from whatever the scanner sent.
///
/// Immutable once created. The timestamp is assigned at decode time on the
/// relay, not supplied by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub barcode: String,
    pub timestamp: i64,
}

impl ScanEvent {
    /// Create an event stamped with the current time.
    pub fn new(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            timestamp: epoch_millis(),
        }
    }
}
