//! One end of an HMON connection under test: runs (or deliberately
//! mis-runs) the handshake and exchanges envelopes, giving a test full
//! control over what a "remote interpreter" or "monitoring orchestrator"
//! sends and when — grounded in the teacher's `MockWsServer`/`MockWsClient`
//! pair, adapted from WebSocket framing to DRP-T framing.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use hmon_protocol::RawEnvelope;
use hmon_transport::{FrameError, Framed, Framer, HandshakeDriver, HandshakeError};
use serde_json::{Map, Value};
use tokio::net::TcpStream;

pub struct MockHmonPeer {
    framed: Framed<TcpStream, Framer>,
}

impl MockHmonPeer {
    pub fn new(stream: TcpStream) -> Self {
        MockHmonPeer { framed: Framed::new(stream, Framer) }
    }

    /// Runs the real four-frame handshake exchange. Both sides of HMON run
    /// the identical sequence, so this is usable whether the peer is
    /// standing in for the dialer's remote or a client dialing into a
    /// listener under test.
    pub async fn run_handshake(&mut self) -> Result<(), HandshakeError> {
        HandshakeDriver::run(&mut self.framed).await.map(|_version| ())
    }

    /// Writes a raw ASCII handshake line, bypassing `HandshakeDriver` —
    /// used to script a deliberately wrong handshake response.
    pub async fn send_handshake_line(&mut self, line: &str) -> Result<(), FrameError> {
        self.framed.send(Bytes::from(line.to_owned())).await
    }

    /// Reads one raw ASCII handshake line, bypassing `HandshakeDriver`.
    pub async fn recv_handshake_line(&mut self) -> Result<String, FrameError> {
        let frame = self.framed.next().await.ok_or(FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "peer closed before sending a handshake line",
        )))??;
        Ok(String::from_utf8_lossy(&frame).into_owned())
    }

    /// Sends a post-handshake `[name, args]` envelope. `args` is typically
    /// built with `serde_json::json!({...})`; pass a `UID` key directly in
    /// the object when the scenario needs a correlated reply.
    pub async fn send_envelope(&mut self, name: &str, args: Value) -> Result<(), FrameError> {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => panic!("mock envelope args must be a JSON object, got {other}"),
        };
        let bytes = hmon_protocol::encode_envelope(name, args, None);
        self.framed.send(Bytes::from(bytes)).await
    }

    /// Reads one post-handshake envelope, returning its name and raw args
    /// object for the test to assert against.
    pub async fn recv_envelope(&mut self) -> Result<(String, Value), FrameError> {
        let frame = self.framed.next().await.ok_or(FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "peer closed before sending an envelope",
        )))??;
        let envelope = RawEnvelope::parse(&frame)
            .unwrap_or_else(|e| panic!("mock peer received a malformed envelope: {e}"));
        Ok((envelope.name, Value::Object(envelope.args)))
    }

    /// Closes the underlying socket immediately, simulating the remote
    /// process dying mid-session.
    pub fn disconnect(self) {
        drop(self);
    }
}
