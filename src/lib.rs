//! `hmon` — monitoring orchestrator and protocol client for a fleet of
//! HMON-speaking interpreter processes.
//!
//! This crate is a thin facade: the wire types live in `hmon-protocol`, the
//! framing/handshake in `hmon-transport`, and the connection/supervisor/
//! orchestrator layer in `hmon-client`. Almost every application only needs
//! this crate's re-exports; reach for the split crates directly when
//! composing a custom transport or embedding the codec elsewhere.
//!
//! ```no_run
//! use hmon::{Orchestrator, OrchestratorOptions, FactKind};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(OrchestratorOptions::default());
//! let session_id = orchestrator.add_server("127.0.0.1", 4502, Some("primary".to_owned())).await;
//! let facts = orchestrator.get_facts(session_id, &[FactKind::Workspace], None, None).await?;
//! println!("{:?}", facts.facts);
//! # Ok(())
//! # }
//! ```

pub use hmon_client::{
    CancellationToken, CommandError, DisconnectReason, Event, EventKind, FactsResponse,
    LastKnownStateResponse, ListenerId, Orchestrator, OrchestratorError, OrchestratorOptions,
    RideConnectionResponse, RetryPolicy, SessionId, SubscribedResponse,
};

pub use hmon_protocol::{
    AccountInformationFact, DecodeError, Fact, FactKind, FactValue, HmonTimestamp, HostFact, InternalLocation,
    OsError, SubscriptionEvent, SuspendedThreadsFact, ThreadCountFact, ThreadInfo, ThreadsFact, WorkspaceFact,
};
