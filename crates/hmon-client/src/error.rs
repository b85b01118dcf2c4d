use crate::session_id::SessionId;
use thiserror::Error;

/// Raised by an in-flight correlated command (`get_facts`, `subscribe`, ...).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("session {0} is not connected")]
    UnknownSession(SessionId),

    #[error("command timed out waiting for a correlated response")]
    Timeout,

    #[error("command was cancelled by the caller")]
    Cancelled,

    #[error("the connection closed before a response arrived")]
    ConnectionClosed,

    #[error("remote rejected the command as {kind}: {detail}")]
    Rejected { kind: &'static str, detail: serde_json::Value },

    #[error("response did not match the expected shape for this command")]
    UnexpectedResponse,
}

/// Raised by the orchestrator's own bookkeeping, independent of any one
/// connection.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no session with id {0}")]
    UnknownSession(SessionId),

    #[error("the event stream has already been taken")]
    EventStreamAlreadyTaken,
}
