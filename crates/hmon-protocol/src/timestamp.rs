//! HMON timestamps are rendered as `YYYYMMDDTHHMMSS.fffZ`, always UTC.
//! Any other format is rejected rather than guessed at.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// A decoded HMON wire timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HmonTimestamp(pub DateTime<Utc>);

impl HmonTimestamp {
    pub fn now() -> Self {
        HmonTimestamp(Utc::now())
    }

    pub fn parse(raw: &str) -> Result<Self, crate::error::DecodeError> {
        // chrono's `%.3f` only matches a literal '.', so a plain %Y%m%dT%H%M%S%.3fZ
        // format string round-trips exactly what the wire sends.
        let naive = NaiveDateTime::parse_from_str(raw, FORMAT)
            .map_err(|_| crate::error::DecodeError::BadTimestamp(raw.to_owned()))?;
        Ok(HmonTimestamp(naive.and_utc()))
    }

    pub fn to_wire_string(self) -> String {
        self.0.format(FORMAT).to_string()
    }
}

impl fmt::Display for HmonTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl Serialize for HmonTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire_string())
    }
}

impl<'de> Deserialize<'de> for HmonTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HmonTimestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_wire_format() {
        let ts = HmonTimestamp(Utc.with_ymd_and_hms(2026, 2, 17, 10, 0, 0).unwrap());
        let wire = ts.to_wire_string();
        assert_eq!(wire, "20260217T100000.000Z");
        assert_eq!(HmonTimestamp::parse(&wire).unwrap(), ts);
    }

    #[test]
    fn rejects_other_formats() {
        assert!(HmonTimestamp::parse("2026-02-17T10:00:00Z").is_err());
        assert!(HmonTimestamp::parse("not a timestamp").is_err());
    }
}
