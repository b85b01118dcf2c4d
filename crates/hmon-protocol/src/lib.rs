//! Wire-level types and codecs for the HMON monitoring protocol: the
//! post-handshake envelope shape, the `Fact` tagged union, outbound command
//! builders, and inbound message dispatch. No I/O lives here; see
//! `hmon-transport` for framing and handshake, and `hmon-client` for the
//! connection and orchestrator layer built on top of this crate.

mod commands;
mod envelope;
mod error;
mod fact;
mod inbound;
mod numeric_bool;
mod structured_fields;
mod timestamp;

pub use commands::{
    bump_facts, connect_ride, get_facts, get_last_known_state, poll_facts, stop_facts_polling,
    subscribe, Command, SubscriptionEvent,
};
pub use envelope::{encode_envelope, RawEnvelope};
pub use error::DecodeError;
pub use fact::{
    AccountInformationFact, Fact, FactKind, FactValue, HostFact, SuspendedThreadsFact, ThreadCountFact,
    ThreadInfo, ThreadsFact, WorkspaceFact,
};
pub use inbound::{
    decode_envelope, FactsPayload, InboundMessage, LastKnownStatePayload, NotificationPayload,
    RemoteRejectionPayload, RideConnectionPayload, SubscribedPayload, UserMessagePayload,
};
pub use structured_fields::{InternalLocation, OsError};
pub use timestamp::HmonTimestamp;

pub mod wire {
    //! Field-level codec helpers for composing custom wire types outside
    //! this crate (e.g. `#[serde(with = "hmon_protocol::wire::numeric_bool")]`).
    pub use crate::numeric_bool as numeric_bool;
}
