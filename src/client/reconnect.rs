//! Reconnection state machine for the viewer's channel to the relay.
//!
//! Pure state, no I/O: the driver in [`super::feed`] reports transport
//! events and this module answers with the transition taken and, for
//! unexpected losses, whether and when to retry. Keeping the machine
//! separate makes the backoff schedule and the intentional-vs-unexpected
//! close distinction independently testable.
//!
//! ```text
//! Idle ─► Connecting ─► Open ─┬─► ClosedUnexpected ─► Connecting (retry)
//!              │              │           │
//!              │              │           └─► Failed (attempts exhausted)
//!              └──────────────┴─► ClosingIntentional (teardown, terminal)
//! ```

use std::time::Duration;

/// Retry ceiling before the channel is declared failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// First retry delay; doubles per attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Upper bound on the retry delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(30_000);

/// Lifecycle of the single logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection and none in progress.
    Idle,
    /// Handshake in flight.
    Connecting,
    /// Channel established.
    Open,
    /// Torn down on purpose; never retried.
    ClosingIntentional,
    /// Lost without being asked to close.
    ClosedUnexpected,
    /// Retries exhausted; terminal until a manual reconnect.
    Failed,
}

/// What the consumer currently wants from the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Connected,
    Disconnected,
}

/// Answer to "the transport just dropped — now what?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule one retry after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted; wait for manual intervention.
    GiveUp,
    /// The close was intentional; never retry.
    Suppressed,
}

/// The machine itself: current state plus backoff bookkeeping.
#[derive(Debug, Clone)]
pub struct ReconnectContext {
    state: ChannelState,
    attempts: u32,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    desired: DesiredState,
}

impl ReconnectContext {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_cap: Duration) -> Self {
        Self {
            state: ChannelState::Idle,
            attempts: 0,
            max_attempts,
            backoff_base,
            backoff_cap,
            desired: DesiredState::Connected,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Begin a connection attempt.
    ///
    /// A second connect request while already `Connecting` or `Open` is a
    /// no-op, guarding against concurrent connection attempts. Returns
    /// whether a handshake should actually be started.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            ChannelState::Connecting | ChannelState::Open => false,
            _ => {
                self.state = ChannelState::Connecting;
                self.desired = DesiredState::Connected;
                true
            }
        }
    }

    /// Handshake succeeded: attempts reset, channel open.
    pub fn connected(&mut self) {
        self.state = ChannelState::Open;
        self.attempts = 0;
    }

    /// The transport closed or errored without being asked to.
    ///
    /// Covers both handshake failure/timeout (from `Connecting`) and loss
    /// of an open channel. The attempt counter increments first; the delay
    /// is `base * 2^(attempt-1)`, capped.
    pub fn connection_lost(&mut self) -> ReconnectDecision {
        if self.desired == DesiredState::Disconnected {
            self.state = ChannelState::ClosingIntentional;
            return ReconnectDecision::Suppressed;
        }

        self.state = ChannelState::ClosedUnexpected;
        if self.attempts >= self.max_attempts {
            self.state = ChannelState::Failed;
            return ReconnectDecision::GiveUp;
        }

        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.backoff_delay(self.attempts),
        }
    }

    /// Consumer teardown: suppress all future retries.
    pub fn close_intentional(&mut self) {
        self.desired = DesiredState::Disconnected;
        self.state = ChannelState::ClosingIntentional;
    }

    /// Explicit user request to reconnect: resets the attempt counter and
    /// restarts from `Idle`, even out of `Failed`.
    pub fn manual_reconnect(&mut self) {
        self.attempts = 0;
        self.desired = DesiredState::Connected;
        self.state = ChannelState::Idle;
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        // Shift capped so the multiplication cannot overflow before the
        // cap comparison.
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        delay.min(self.backoff_cap)
    }
}

impl Default for ReconnectContext {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BACKOFF_BASE,
            DEFAULT_BACKOFF_CAP,
        )
    }
}
