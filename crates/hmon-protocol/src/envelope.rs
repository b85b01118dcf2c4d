//! The post-handshake payload shape: a two-element JSON array `[name, args]`.

use crate::error::DecodeError;
use serde_json::Value;

/// A raw, not-yet-dispatched envelope: a command/event name plus its JSON
/// object of arguments.
pub struct RawEnvelope {
    pub name: String,
    pub args: serde_json::Map<String, Value>,
}

impl RawEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<RawEnvelope, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let mut elements = match value {
            Value::Array(elements) if elements.len() == 2 => elements,
            _ => return Err(DecodeError::NotAnEnvelope),
        };
        let args = elements.pop().unwrap();
        let name = elements.pop().unwrap();
        let name = name.as_str().ok_or(DecodeError::NotAnEnvelope)?.to_owned();
        let args = match args {
            Value::Object(map) => map,
            _ => return Err(DecodeError::NotAnEnvelope),
        };
        Ok(RawEnvelope { name, args })
    }

    /// The `UID` correlation field, when present.
    pub fn uid(&self) -> Option<&str> {
        self.args.get("UID").and_then(Value::as_str)
    }
}

/// Encode `[name, args]` as the UTF-8 JSON bytes carried in one DRP-T
/// payload.
pub fn encode_envelope(name: &str, mut args: serde_json::Map<String, Value>, uid: Option<&str>) -> Vec<u8> {
    if let Some(uid) = uid {
        args.insert("UID".to_owned(), Value::String(uid.to_owned()));
    }
    let envelope = Value::Array(vec![Value::String(name.to_owned()), Value::Object(args)]);
    serde_json::to_vec(&envelope).expect("envelope always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_element_array() {
        let bytes = br#"["Facts", {"UID": "abc", "Facts": []}]"#;
        let env = RawEnvelope::parse(bytes).unwrap();
        assert_eq!(env.name, "Facts");
        assert_eq!(env.uid(), Some("abc"));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(RawEnvelope::parse(br#"["Facts"]"#).is_err());
        assert!(RawEnvelope::parse(br#"["Facts", {}, {}]"#).is_err());
    }

    #[test]
    fn encode_injects_uid() {
        let bytes = encode_envelope("GetFacts", serde_json::Map::new(), Some("u-1"));
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[0], "GetFacts");
        assert_eq!(value[1]["UID"], "u-1");
    }

    #[test]
    fn encode_omits_uid_when_none() {
        let bytes = encode_envelope("StopFacts", serde_json::Map::new(), None);
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value[1].get("UID").is_none());
    }
}
