//! Viewer-side consumer of the push channel.
//!
//! - [`reconnect`] - the pure reconnection state machine with exponential
//!   backoff
//! - [`feed`] - the tokio-tungstenite driver that turns the channel into a
//!   stream of [`feed::FeedEvent`]s

pub mod feed;
pub mod reconnect;

pub use feed::{FeedError, FeedEvent, ScanFeed, ScanFeedHandle, HANDSHAKE_TIMEOUT};
pub use reconnect::{
    ChannelState, DesiredState, ReconnectContext, ReconnectDecision, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_CAP, DEFAULT_MAX_ATTEMPTS,
};
