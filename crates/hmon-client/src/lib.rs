//! The connection, supervisor and orchestrator layer built on top of
//! `hmon-protocol`'s wire types and `hmon-transport`'s framing/handshake:
//! `ConnectionActor`, `ServerSupervisor` (dialer), `ListenerSupervisor`
//! (acceptor), the `Orchestrator` aggregate root, and the TTL `FactCache`.

mod connection;
mod error;
mod event;
mod fact_cache;
mod listener_id;
mod listener_supervisor;
mod orchestrator;
mod retry;
mod server_supervisor;
mod session_id;

pub use error::{CommandError, OrchestratorError};
pub use event::{DisconnectReason, Event, EventKind};
pub use listener_id::ListenerId;
pub use orchestrator::{
    FactsResponse, LastKnownStateResponse, Orchestrator, OrchestratorOptions, RideConnectionResponse,
    SubscribedResponse,
};
pub use retry::RetryPolicy;
pub use session_id::SessionId;

pub use tokio_util::sync::CancellationToken;
