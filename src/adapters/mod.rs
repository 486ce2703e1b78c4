//! Adapters binding the relay to the outside world.

pub mod http;
pub mod websocket;
