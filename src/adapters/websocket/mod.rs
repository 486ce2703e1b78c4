//! Server side of the push channel.
//!
//! ```text
//! scanner POST /scan
//!         │
//!         ▼
//!   RelayService ──► BroadcastEngine ──► SessionRegistry snapshot
//!                                           │        │
//!                                           ▼        ▼
//!                                       session-a  session-b ...
//!                                       (writer task each, 30s ping)
//! ```
//!
//! - [`messages`] - wire protocol frames
//! - [`registry`] - the set of connected viewer sessions
//! - [`broadcast`] - fan-out with partial-failure tolerance
//! - [`handler`] - axum upgrade handler and per-connection loop

pub mod broadcast;
pub mod handler;
pub mod messages;
pub mod registry;

pub use broadcast::{BroadcastEngine, BroadcastOutcome};
pub use handler::{ws_handler, HEARTBEAT_INTERVAL};
pub use messages::{BarcodeMessage, ConnectionMessage, ServerMessage};
pub use registry::{Outbound, SessionHandle, SessionId, SessionRegistry, SessionState};
