//! Session registry: the single source of truth for connected viewers.
//!
//! Every successfully upgraded WebSocket gets exactly one [`SessionHandle`]
//! registered here. The registry owns the handle for the session's lifetime;
//! the broadcast engine and the health endpoint only ever see
//! snapshot-scoped `Arc` references.
//!
//! # Thread Safety
//!
//! Uses `RwLock` for the session map since broadcasts (reads) vastly
//! outnumber connects/disconnects (writes). The active count is kept in an
//! atomic so health reporting never takes the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Unique identifier for a viewer session.
///
/// Generated server-side when a viewer connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Open => 0,
            SessionState::Closing => 1,
            SessionState::Closed => 2,
        }
    }
}

/// Instruction for a session's connection task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Deliver a pre-serialized frame to the viewer.
    Frame(Arc<str>),
    /// Close the connection gracefully (server shutdown).
    Close,
}

/// Non-blocking handle to one connected viewer.
///
/// Delivery is a channel handoff to the session's own writer task, so a
/// slow viewer can never stall the fan-out. `last_pong_at` is diagnostic
/// only; pruning is driven by transport close/error, not missed pongs.
pub struct SessionHandle {
    id: SessionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: AtomicU8,
    last_pong_at: AtomicI64,
}

impl SessionHandle {
    pub fn new(id: SessionId, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            outbound,
            state: AtomicU8::new(SessionState::Open.as_u8()),
            last_pong_at: AtomicI64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open && !self.outbound.is_closed()
    }

    /// Hand a frame to the session's writer task.
    ///
    /// Returns `false` if the session is not open or its task has already
    /// gone away; the caller treats that as a per-session delivery failure.
    pub fn send(&self, frame: Arc<str>) -> bool {
        if self.state() != SessionState::Open {
            return false;
        }
        self.outbound.send(Outbound::Frame(frame)).is_ok()
    }

    /// Ask the connection task to close the transport gracefully.
    pub fn request_close(&self) {
        self.set_state(SessionState::Closing);
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Record a heartbeat acknowledgment from the viewer.
    pub fn touch_pong(&self) {
        self.last_pong_at
            .store(crate::domain::epoch_millis(), Ordering::Release);
    }

    /// When the viewer last answered a ping, if ever.
    pub fn last_pong_at(&self) -> Option<i64> {
        match self.last_pong_at.load(Ordering::Acquire) {
            0 => None,
            millis => Some(millis),
        }
    }
}

/// The set of currently-connected viewer sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    active: AtomicUsize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
        }
    }

    /// Register a session. Called exactly once per successful handshake.
    pub async fn add(&self, handle: Arc<SessionHandle>) {
        let mut sessions = self.sessions.write().await;
        if sessions.insert(handle.id(), handle).is_none() {
            self.active.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a session by ID.
    ///
    /// Idempotent: the liveness path and the transport's own close/error
    /// notification may race to remove the same session, and the loser must
    /// be a no-op.
    pub async fn remove(&self, id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.remove(id) {
            handle.set_state(SessionState::Closed);
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Snapshot the current member set for iteration.
    ///
    /// Visitors frequently mutate the registry mid-pass (a failed send
    /// triggers removal); iterating a snapshot means no entry is skipped or
    /// double-visited because of that.
    pub async fn snapshot(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of registered sessions, without taking the lock.
    pub fn len(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask every session to close gracefully (server shutdown).
    pub async fn close_all(&self) {
        for handle in self.snapshot().await {
            handle.request_close();
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
