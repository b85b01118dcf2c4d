//! The HMON wire format encodes booleans as the integers `0`/`1`, but some
//! server versions still emit JSON `true`/`false`. Encoders always emit the
//! integer form; decoders accept either.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

struct NumericBoolVisitor;

impl Visitor<'_> for NumericBoolVisitor {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer 0/1 or a JSON boolean")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
        match v {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Unsigned(other),
                &"0 or 1",
            )),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
        match v {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Signed(other),
                &"0 or 1",
            )),
        }
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    deserializer.deserialize_any(NumericBoolVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        flag: bool,
    }

    #[test]
    fn encodes_as_integer() {
        let json = serde_json::to_string(&Wrapper { flag: true }).unwrap();
        assert_eq!(json, r#"{"flag":1}"#);
    }

    #[test]
    fn decodes_integer_and_boolean_forms() {
        let from_int: Wrapper = serde_json::from_str(r#"{"flag":1}"#).unwrap();
        assert!(from_int.flag);
        let from_bool: Wrapper = serde_json::from_str(r#"{"flag":false}"#).unwrap();
        assert!(!from_bool.flag);
    }
}
