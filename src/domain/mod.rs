//! Pure domain types for the scan relay.
//!
//! Nothing in this module performs I/O; everything is constructible and
//! testable without a runtime.

pub mod scan;

pub use scan::{epoch_millis, ScanEvent, ScanPayload};
