//! `Fact` is a tagged union keyed by the wire `ID`/`Name` pair. The
//! substructure lives under a `Value` key for current server versions;
//! legacy peers inline the substructure fields alongside `ID`/`Name` at the
//! top level. Both shapes decode to the same [`Fact`].

use crate::error::DecodeError;
use crate::structured_fields::{InternalLocation, OsError};
use crate::timestamp::HmonTimestamp;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Discriminator for a fact variant, independent of any particular value.
/// Used as the `FactCache` key alongside `SessionId` and as the wire
/// integer in `GetFacts`/`PollFacts` command args.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactKind {
    Host,
    AccountInformation,
    Workspace,
    Threads,
    SuspendedThreads,
    ThreadCount,
}

impl FactKind {
    pub const ALL: [FactKind; 6] = [
        FactKind::Host,
        FactKind::AccountInformation,
        FactKind::Workspace,
        FactKind::Threads,
        FactKind::SuspendedThreads,
        FactKind::ThreadCount,
    ];

    pub fn wire_id(self) -> i64 {
        match self {
            FactKind::Host => 1,
            FactKind::AccountInformation => 2,
            FactKind::Workspace => 3,
            FactKind::Threads => 4,
            FactKind::SuspendedThreads => 5,
            FactKind::ThreadCount => 6,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            FactKind::Host => "Host",
            FactKind::AccountInformation => "AccountInformation",
            FactKind::Workspace => "Workspace",
            FactKind::Threads => "Threads",
            FactKind::SuspendedThreads => "SuspendedThreads",
            FactKind::ThreadCount => "ThreadCount",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<FactKind> {
        FactKind::ALL.into_iter().find(|k| k.wire_name() == name)
    }
}

impl Serialize for FactKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.wire_id())
    }
}

impl<'de> Deserialize<'de> for FactKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = i64::deserialize(deserializer)?;
        FactKind::ALL
            .into_iter()
            .find(|k| k.wire_id() == id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown fact id {id}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostFact {
    pub machine_name: String,
    pub user_name: String,
    pub host_os: String,
    pub host_platform: String,
    pub interpreter_version: String,
    pub bits: u32,
    pub process_id: u32,
    pub access_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountInformationFact {
    pub user_identification: String,
    pub compute_time_ms: u64,
    pub connect_time: HmonTimestamp,
    pub keying_time_ms: u64,
    pub session_start_time: HmonTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkspaceFact {
    #[serde(rename = "WSID")]
    pub wsid: String,
    pub available: u64,
    pub used: u64,
    pub compactions: u64,
    pub garbage_collections: u64,
    pub sediment: u64,
    pub allocation_heap: u64,
    pub trap_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThreadInfo {
    pub tid: u32,
    pub state: String,
    #[serde(with = "crate::numeric_bool")]
    pub suspended: bool,
    pub flags: u32,
    #[serde(default)]
    pub internal_location: Option<InternalLocation>,
    #[serde(default, rename = "OSError")]
    pub os_error: Option<OsError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThreadsFact {
    pub threads: Vec<ThreadInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SuspendedThreadsFact {
    pub tids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThreadCountFact {
    pub total: u32,
    pub suspended: u32,
}

/// The decoded payload of a fact, independent of its wire `ID`/`Name`.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Host(HostFact),
    AccountInformation(AccountInformationFact),
    Workspace(WorkspaceFact),
    Threads(ThreadsFact),
    SuspendedThreads(SuspendedThreadsFact),
    ThreadCount(ThreadCountFact),
}

impl FactValue {
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Host(_) => FactKind::Host,
            FactValue::AccountInformation(_) => FactKind::AccountInformation,
            FactValue::Workspace(_) => FactKind::Workspace,
            FactValue::Threads(_) => FactKind::Threads,
            FactValue::SuspendedThreads(_) => FactKind::SuspendedThreads,
            FactValue::ThreadCount(_) => FactKind::ThreadCount,
        }
    }

    fn from_json(kind: FactKind, value: serde_json::Value) -> Result<FactValue, DecodeError> {
        match kind {
            FactKind::Host => Ok(FactValue::Host(serde_json::from_value(value)?)),
            FactKind::AccountInformation => {
                Ok(FactValue::AccountInformation(serde_json::from_value(value)?))
            }
            FactKind::Workspace => Ok(FactValue::Workspace(serde_json::from_value(value)?)),
            FactKind::Threads => Ok(FactValue::Threads(serde_json::from_value(value)?)),
            FactKind::SuspendedThreads => {
                Ok(FactValue::SuspendedThreads(serde_json::from_value(value)?))
            }
            FactKind::ThreadCount => Ok(FactValue::ThreadCount(serde_json::from_value(value)?)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            FactValue::Host(v) => serde_json::to_value(v),
            FactValue::AccountInformation(v) => serde_json::to_value(v),
            FactValue::Workspace(v) => serde_json::to_value(v),
            FactValue::Threads(v) => serde_json::to_value(v),
            FactValue::SuspendedThreads(v) => serde_json::to_value(v),
            FactValue::ThreadCount(v) => serde_json::to_value(v),
        }
        .expect("fact substructures always serialize")
    }
}

/// A single fact, with the outer `ID`/`Name` preserved alongside its typed
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub id: i64,
    pub name: String,
    pub value: FactValue,
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        self.value.kind()
    }

    pub fn new(value: FactValue) -> Fact {
        let kind = value.kind();
        Fact { id: kind.wire_id(), name: kind.wire_name().to_owned(), value }
    }

    /// Decode one fact object from the `Facts` payload array, handling both
    /// the legacy inline shape and the current `Value`-nested shape.
    pub fn from_json(object: serde_json::Value) -> Result<Fact, DecodeError> {
        let mut map = object
            .as_object()
            .ok_or(DecodeError::MissingFactField { name: "Fact", field: "object" })?
            .clone();

        let id = map
            .get("ID")
            .and_then(serde_json::Value::as_i64)
            .ok_or(DecodeError::MissingFactField { name: "Fact", field: "ID" })?;
        let name = map
            .get("Name")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::MissingFactField { name: "Fact", field: "Name" })?
            .to_owned();

        let kind = FactKind::from_wire_name(&name).ok_or_else(|| DecodeError::UnknownFactName(name.clone()))?;

        let substructure = match map.remove("Value") {
            Some(nested) => nested,
            None => serde_json::Value::Object(map),
        };

        let value = FactValue::from_json(kind, substructure)?;
        Ok(Fact { id, name, value })
    }
}

impl Serialize for Fact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("ID", &self.id)?;
        map.serialize_entry("Name", &self.name)?;
        map.serialize_entry("Value", &self.value.to_json())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Fact::from_json(value).map_err(serde::de::Error::custom)
    }
}
