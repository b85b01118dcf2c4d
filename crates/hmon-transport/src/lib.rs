//! DRP-T framing and the HMON handshake. Generic over any
//! `AsyncRead + AsyncWrite`, so the same code drives a live `TcpStream` in
//! `hmon-client` and an in-memory `tokio::io::duplex` in tests.

mod framer;
mod handshake;

pub use framer::{FrameError, Framer, MAX_FRAME_LEN};
pub use handshake::{HandshakeDriver, HandshakeError, SUPPORTED_PROTOCOL_VERSION};

pub use tokio_util::codec::Framed;
