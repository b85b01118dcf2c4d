//! Outbound command builders: `[name, args]` envelopes the orchestrator
//! sends to a remote interpreter.

use crate::fact::FactKind;
use serde_json::{Map, Value};

/// Subscription event kinds, wire values `1..6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    WorkspaceCompaction,
    WorkspaceResize,
    UntrappedSignal,
    TrappedSignal,
    ThreadSwitch,
    All,
}

impl SubscriptionEvent {
    pub fn wire_id(self) -> i64 {
        match self {
            SubscriptionEvent::WorkspaceCompaction => 1,
            SubscriptionEvent::WorkspaceResize => 2,
            SubscriptionEvent::UntrappedSignal => 3,
            SubscriptionEvent::TrappedSignal => 4,
            SubscriptionEvent::ThreadSwitch => 5,
            SubscriptionEvent::All => 6,
        }
    }
}

/// A command ready to be placed on the wire. `requires_uid` mirrors the
/// protocol's carve-out for `StopFacts`/`BumpFacts`, which MUST NOT carry a
/// correlation id.
pub struct Command {
    pub name: &'static str,
    pub args: Map<String, Value>,
    pub requires_uid: bool,
}

pub fn get_facts(facts: &[FactKind]) -> Command {
    Command {
        name: "GetFacts",
        args: facts_args(facts),
        requires_uid: true,
    }
}

pub fn get_last_known_state() -> Command {
    Command { name: "GetLastKnownState", args: Map::new(), requires_uid: true }
}

pub fn poll_facts(facts: &[FactKind], interval_ms: u64) -> Command {
    let mut args = facts_args(facts);
    args.insert("Interval".to_owned(), Value::from(interval_ms));
    Command { name: "PollFacts", args, requires_uid: true }
}

pub fn stop_facts_polling() -> Command {
    Command { name: "StopFacts", args: Map::new(), requires_uid: false }
}

pub fn bump_facts() -> Command {
    Command { name: "BumpFacts", args: Map::new(), requires_uid: false }
}

pub fn subscribe(events: &[SubscriptionEvent]) -> Command {
    let ids: Vec<Value> = events.iter().map(|e| Value::from(e.wire_id())).collect();
    let mut args = Map::new();
    args.insert("Events".to_owned(), Value::Array(ids));
    Command { name: "Subscribe", args, requires_uid: true }
}

/// `address`/`port` both `None` is the documented way to ask the remote to
/// close its secondary channel — there is no dedicated disconnect command on
/// the wire (see SPEC_FULL.md §C).
pub fn connect_ride(address: Option<&str>, port: Option<u16>) -> Command {
    let mut args = Map::new();
    if let Some(address) = address {
        args.insert("Address".to_owned(), Value::String(address.to_owned()));
    }
    if let Some(port) = port {
        args.insert("Port".to_owned(), Value::from(port));
    }
    Command { name: "ConnectRide", args, requires_uid: true }
}

fn facts_args(facts: &[FactKind]) -> Map<String, Value> {
    let ids: Vec<Value> = facts.iter().map(|f| Value::from(f.wire_id())).collect();
    let mut args = Map::new();
    args.insert("Facts".to_owned(), Value::Array(ids));
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_and_bump_do_not_require_uid() {
        assert!(!stop_facts_polling().requires_uid);
        assert!(!bump_facts().requires_uid);
    }

    #[test]
    fn get_facts_encodes_wire_ids() {
        let cmd = get_facts(&[FactKind::Workspace, FactKind::Host]);
        assert_eq!(cmd.args["Facts"], Value::Array(vec![Value::from(3), Value::from(1)]));
    }

    #[test]
    fn connect_ride_with_no_address_is_the_disconnect_signal() {
        let cmd = connect_ride(None, None);
        assert!(cmd.args.is_empty());
    }
}
