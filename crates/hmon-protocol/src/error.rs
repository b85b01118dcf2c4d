use thiserror::Error;

/// Errors that can arise while decoding a single HMON envelope.
///
/// A `DecodeError` is never fatal to the connection: per the protocol, a
/// malformed or unrecognized frame is logged and skipped, not propagated as
/// a connection failure (see `ConnectionError` in `hmon-client` for the
/// fatal counterparts).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid UTF-8 JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is not a two-element [name, args] array")]
    NotAnEnvelope,

    #[error("unknown fact name: {0:?}")]
    UnknownFactName(String),

    #[error("fact {name} is missing required field {field}")]
    MissingFactField { name: &'static str, field: &'static str },

    #[error("timestamp {0:?} does not match YYYYMMDDTHHMMSS.fffZ")]
    BadTimestamp(String),

    #[error("expected a 3-element array for OSError, got {0}")]
    BadOsError(usize),
}
