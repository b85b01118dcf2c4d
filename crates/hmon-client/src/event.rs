use crate::session_id::SessionId;
use hmon_protocol::Fact;
use serde_json::Value;
use thiserror::Error;

/// Why a session's socket went away. `ServerSupervisor` logs this and
/// retries; `ListenerSupervisor` logs it and does not — the accepted
/// connection's `SessionId` is retired for good.
#[derive(Debug, Error, Clone)]
pub enum DisconnectReason {
    #[error("the peer closed the connection")]
    ClosedByPeer,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("a malformed frame could not be recovered from")]
    Framing(String),

    #[error("disposed")]
    Disposed,
}

/// One message surfaced on the orchestrator's unified event stream. Every
/// variant is tied to the session that produced it.
#[derive(Debug, Clone)]
pub enum EventKind {
    SessionConnected,
    SessionDisconnected(DisconnectReason),
    FactsReceived { facts: Vec<Fact> },
    NotificationReceived { event_id: i64, event_name: String, tid: Option<i64> },
    LastKnownStateReceived { facts: Vec<Fact> },
    SubscribedResponseReceived { events: Vec<i64> },
    RideConnectionReceived { connected: bool, address: Option<String>, port: Option<u16> },
    UserMessageReceived { text: String },
    UnknownCommand { detail: Value },
    MalformedCommand { detail: Value },
    InvalidSyntax { detail: Value },
    DisallowedUid { detail: Value },
}

#[derive(Debug, Clone)]
pub struct Event {
    pub session_id: SessionId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: SessionId, kind: EventKind) -> Self {
        Event { session_id, kind }
    }
}
