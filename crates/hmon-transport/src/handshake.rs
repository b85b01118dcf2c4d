//! The HMON handshake: before any `[name, args]` envelope crosses the wire,
//! both sides exchange their supported protocol version and then the
//! version they're actually using — four frames total, two in each
//! direction.

use crate::framer::{FrameError, Framer};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::debug;

/// The only protocol version this implementation speaks.
pub const SUPPORTED_PROTOCOL_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("connection closed before the handshake completed")]
    ClosedEarly,

    #[error("malformed handshake line: {0:?}")]
    Malformed(String),

    #[error("no protocol version in common (this side supports {local}, peer announced {peer})")]
    NoCommonVersion { local: u32, peer: u32 },

    #[error("peer chose to use protocol {0}, which neither side advertised as supported")]
    UnsupportedChoice(u32),
}

/// Drives the four-message exchange over an already-connected stream.
/// Returns the negotiated protocol version (today, always
/// [`SUPPORTED_PROTOCOL_VERSION`] — there is only one).
pub struct HandshakeDriver;

impl HandshakeDriver {
    pub async fn run<S>(framed: &mut Framed<S, Framer>) -> Result<u32, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        framed
            .send(Bytes::from(format!("SupportedProtocols={SUPPORTED_PROTOCOL_VERSION}")))
            .await?;
        let peer_supported = parse_kv(&Self::read_line(framed).await?, "SupportedProtocols")?;
        if peer_supported != SUPPORTED_PROTOCOL_VERSION {
            return Err(HandshakeError::NoCommonVersion {
                local: SUPPORTED_PROTOCOL_VERSION,
                peer: peer_supported,
            });
        }

        framed
            .send(Bytes::from(format!("UsingProtocol={SUPPORTED_PROTOCOL_VERSION}")))
            .await?;
        let chosen = parse_kv(&Self::read_line(framed).await?, "UsingProtocol")?;
        if chosen != SUPPORTED_PROTOCOL_VERSION {
            return Err(HandshakeError::UnsupportedChoice(chosen));
        }

        debug!(version = chosen, "handshake complete");
        Ok(chosen)
    }

    async fn read_line<S>(framed: &mut Framed<S, Framer>) -> Result<String, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = framed.next().await.ok_or(HandshakeError::ClosedEarly)??;
        String::from_utf8(frame.to_vec()).map_err(|_| HandshakeError::Malformed("not utf-8".to_owned()))
    }
}

fn parse_kv(line: &str, key: &str) -> Result<u32, HandshakeError> {
    let (k, v) = line.split_once('=').ok_or_else(|| HandshakeError::Malformed(line.to_owned()))?;
    if k != key {
        return Err(HandshakeError::Malformed(line.to_owned()));
    }
    v.parse().map_err(|_| HandshakeError::Malformed(line.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn both_sides_agree_on_the_only_version() {
        let (a, b) = duplex(256);
        let mut a = Framed::new(a, Framer);
        let mut b = Framed::new(b, Framer);

        let (ra, rb) = tokio::join!(HandshakeDriver::run(&mut a), HandshakeDriver::run(&mut b));
        assert_eq!(ra.unwrap(), SUPPORTED_PROTOCOL_VERSION);
        assert_eq!(rb.unwrap(), SUPPORTED_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn mismatched_supported_version_is_rejected() {
        let (a, b) = duplex(256);
        let mut a = Framed::new(a, Framer);
        let mut b = Framed::new(b, Framer);

        let client = async {
            a.send(Bytes::from_static(b"SupportedProtocols=99")).await.unwrap();
            let _ = a.next().await;
        };
        let server = HandshakeDriver::run(&mut b);

        let (_, server_result) = tokio::join!(client, server);
        assert!(matches!(server_result, Err(HandshakeError::NoCommonVersion { .. })));
    }
}
