//! Scan events and the inbound payload decoder.

mod decode;
mod event;

pub use decode::ScanPayload;
pub use event::{epoch_millis, ScanEvent};
