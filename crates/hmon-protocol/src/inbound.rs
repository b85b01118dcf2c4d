//! Decoding of remote -> orchestrator envelopes into the protocol-level
//! [`InboundMessage`]. `hmon-client` stamps these with a `SessionId` to
//! produce the application-facing `Event`.

use crate::envelope::RawEnvelope;
use crate::error::DecodeError;
use crate::fact::Fact;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct FactsPayload {
    pub uid: Option<String>,
    pub facts: Vec<Fact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub event_id: i64,
    pub event_name: String,
    pub tid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastKnownStatePayload {
    pub uid: Option<String>,
    pub facts: Vec<Fact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscribedPayload {
    pub uid: Option<String>,
    pub events: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RideConnectionPayload {
    pub uid: Option<String>,
    pub connected: bool,
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMessagePayload {
    pub text: String,
}

/// A `UnknownCommand` / `MalformedCommand` / `InvalidSyntax` / `DisallowedUID`
/// rejection. The external protocol does not pin down a stable schema for
/// these beyond "echo whatever the client can use for diagnostics", so the
/// original args are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRejectionPayload {
    pub uid: Option<String>,
    pub detail: Value,
}

/// The decoded, protocol-level shape of one inbound envelope (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Facts(FactsPayload),
    Notification(NotificationPayload),
    LastKnownState(LastKnownStatePayload),
    Subscribed(SubscribedPayload),
    RideConnection(RideConnectionPayload),
    UserMessage(UserMessagePayload),
    UnknownCommand(RemoteRejectionPayload),
    MalformedCommand(RemoteRejectionPayload),
    InvalidSyntax(RemoteRejectionPayload),
    DisallowedUid(RemoteRejectionPayload),
}

impl InboundMessage {
    /// The `UID` carried by this message, if any — used by the connection
    /// actor to route the message to a pending caller instead of the public
    /// event stream.
    pub fn uid(&self) -> Option<&str> {
        match self {
            InboundMessage::Facts(p) => p.uid.as_deref(),
            InboundMessage::Notification(_) => None,
            InboundMessage::LastKnownState(p) => p.uid.as_deref(),
            InboundMessage::Subscribed(p) => p.uid.as_deref(),
            InboundMessage::RideConnection(p) => p.uid.as_deref(),
            InboundMessage::UserMessage(_) => None,
            InboundMessage::UnknownCommand(p)
            | InboundMessage::MalformedCommand(p)
            | InboundMessage::InvalidSyntax(p)
            | InboundMessage::DisallowedUid(p) => p.uid.as_deref(),
        }
    }
}

/// Decode one post-handshake frame payload.
///
/// Returns `Ok(None)` for a recognized-but-to-be-ignored shape (there are
/// none today; reserved for forward protocol evolution alongside the
/// unknown-command-name case, which is also `Ok(None)`).
pub fn decode_envelope(bytes: &[u8]) -> Result<Option<InboundMessage>, DecodeError> {
    let envelope = RawEnvelope::parse(bytes)?;
    let uid = envelope.uid().map(str::to_owned);

    let message = match envelope.name.as_str() {
        "Facts" => InboundMessage::Facts(FactsPayload { uid, facts: decode_facts_array(&envelope.args)? }),
        "Notification" => {
            let event = envelope
                .args
                .get("Event")
                .ok_or(DecodeError::MissingFactField { name: "Notification", field: "Event" })?;
            let event_id = event
                .get("ID")
                .and_then(Value::as_i64)
                .ok_or(DecodeError::MissingFactField { name: "Notification", field: "Event.ID" })?;
            let event_name = event
                .get("Name")
                .and_then(Value::as_str)
                .ok_or(DecodeError::MissingFactField { name: "Notification", field: "Event.Name" })?
                .to_owned();
            let tid = envelope.args.get("Tid").and_then(Value::as_i64);
            InboundMessage::Notification(NotificationPayload { event_id, event_name, tid })
        }
        "LastKnownState" => InboundMessage::LastKnownState(LastKnownStatePayload {
            uid,
            facts: decode_facts_array(&envelope.args)?,
        }),
        "Subscribed" => {
            let events = envelope
                .args
                .get("Events")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            InboundMessage::Subscribed(SubscribedPayload { uid, events })
        }
        "RideConnection" => {
            let connected = envelope
                .args
                .get("Connected")
                .map(value_as_numeric_bool)
                .unwrap_or(false);
            let address = envelope.args.get("Address").and_then(Value::as_str).map(str::to_owned);
            let port = envelope
                .args
                .get("Port")
                .and_then(Value::as_u64)
                .map(|p| p as u16);
            InboundMessage::RideConnection(RideConnectionPayload { uid, connected, address, port })
        }
        "UserMessage" => {
            let text = envelope
                .args
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            InboundMessage::UserMessage(UserMessagePayload { text })
        }
        "UnknownCommand" => InboundMessage::UnknownCommand(rejection(uid, envelope.args)),
        "MalformedCommand" => InboundMessage::MalformedCommand(rejection(uid, envelope.args)),
        "InvalidSyntax" => InboundMessage::InvalidSyntax(rejection(uid, envelope.args)),
        "DisallowedUID" => InboundMessage::DisallowedUid(rejection(uid, envelope.args)),
        _ => return Ok(None),
    };

    Ok(Some(message))
}

fn decode_facts_array(args: &serde_json::Map<String, Value>) -> Result<Vec<Fact>, DecodeError> {
    let array = args
        .get("Facts")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingFactField { name: "Facts", field: "Facts" })?;
    array.iter().cloned().map(Fact::from_json).collect()
}

fn rejection(uid: Option<String>, args: serde_json::Map<String, Value>) -> RemoteRejectionPayload {
    RemoteRejectionPayload { uid, detail: Value::Object(args) }
}

fn value_as_numeric_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_name_is_ignored() {
        let bytes = br#"["TotallyNewThing", {}]"#;
        assert_eq!(decode_envelope(bytes).unwrap(), None);
    }

    #[test]
    fn decodes_notification() {
        let bytes = br#"["Notification", {"Event":{"ID":3,"Name":"UntrappedSignal"}, "Tid": 7}]"#;
        let msg = decode_envelope(bytes).unwrap().unwrap();
        match msg {
            InboundMessage::Notification(n) => {
                assert_eq!(n.event_name, "UntrappedSignal");
                assert_eq!(n.tid, Some(7));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_facts_with_uid() {
        let bytes = br#"["Facts", {"UID":"u1","Facts":[{"ID":3,"Name":"Workspace","Value":{"WSID":"CLEAR WS","Available":1,"Used":1,"Compactions":0,"GarbageCollections":0,"Sediment":0,"AllocationHeap":0,"TrapSize":0}}]}]"#;
        let msg = decode_envelope(bytes).unwrap().unwrap();
        match msg {
            InboundMessage::Facts(p) => {
                assert_eq!(p.uid.as_deref(), Some("u1"));
                assert_eq!(p.facts.len(), 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bad_fact_in_array_fails_whole_frame() {
        let bytes = br#"["Facts", {"Facts":[{"ID":99,"Name":"Nonsense","Value":{}}]}]"#;
        assert!(decode_envelope(bytes).is_err());
    }
}
