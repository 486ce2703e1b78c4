//! scan-relay - Barcode scan relay
//!
//! Relays barcode-scan POSTs from hardware scanners to live viewer
//! sessions over a WebSocket push channel, best-effort and in
//! near-real-time.

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
