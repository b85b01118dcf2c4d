//! `InternalLocation` and `OSError` ride the wire as heterogeneous
//! fixed-length JSON arrays rather than objects; these wrappers decode them
//! into named records and encode back to the same array shape.

use crate::error::DecodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Interpreter source location: `[file, line]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(String, i64)", into = "(String, i64)")]
pub struct InternalLocation {
    pub file: String,
    pub line: i64,
}

impl TryFrom<(String, i64)> for InternalLocation {
    type Error = std::convert::Infallible;

    fn try_from((file, line): (String, i64)) -> Result<Self, Self::Error> {
        Ok(InternalLocation { file, line })
    }
}

impl From<InternalLocation> for (String, i64) {
    fn from(loc: InternalLocation) -> Self {
        (loc.file, loc.line)
    }
}

/// An OS-level error: `[source, code, description]`, or JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsError {
    pub source: i64,
    pub code: i64,
    pub description: String,
}

impl Serialize for OsError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.source, self.code, self.description.as_str()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OsError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (source, code, description): (i64, i64, String) = Deserialize::deserialize(deserializer)?;
        Ok(OsError { source, code, description })
    }
}

/// Decode an `OSError` array element from a `serde_json::Value`, accepting
/// `null` as "no error".
fn os_error_from_value(value: &serde_json::Value) -> Result<Option<OsError>, DecodeError> {
    if value.is_null() {
        return Ok(None);
    }
    let arr = value.as_array().ok_or(DecodeError::BadOsError(0))?;
    if arr.len() != 3 {
        return Err(DecodeError::BadOsError(arr.len()));
    }
    let source = arr[0].as_i64().ok_or(DecodeError::BadOsError(3))?;
    let code = arr[1].as_i64().ok_or(DecodeError::BadOsError(3))?;
    let description = arr[2]
        .as_str()
        .ok_or(DecodeError::BadOsError(3))?
        .to_owned();
    Ok(Some(OsError { source, code, description }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_location_round_trips_as_array() {
        let loc = InternalLocation { file: "foo.dyalog".to_owned(), line: 42 };
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, r#"["foo.dyalog",42]"#);
        let back: InternalLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn os_error_round_trips_as_array() {
        let err = OsError { source: 1, code: 2, description: "boom".to_owned() };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"[1,2,"boom"]"#);
        let back: OsError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn os_error_accepts_null() {
        let value: serde_json::Value = serde_json::from_str("null").unwrap();
        assert_eq!(os_error_from_value(&value).unwrap(), None);
    }

    #[test]
    fn os_error_rejects_wrong_length() {
        let value: serde_json::Value = serde_json::from_str("[1,2]").unwrap();
        assert!(os_error_from_value(&value).is_err());
    }
}
