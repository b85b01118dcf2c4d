//! Binds a random port and hands out one [`MockHmonPeer`] per accepted
//! connection, for tests that exercise a `ServerSupervisor` dialing *into*
//! a stand-in remote interpreter. Grounded in the teacher's `MockWsServer`,
//! but without a baked-in protocol loop: each test drives its own
//! handshake/envelope sequence on the peer it gets back, since the whole
//! point of these tests is to script unusual sequences (version mismatches,
//! slow replies, mid-session drops).

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::mock_peer::MockHmonPeer;

/// A mock HMON listener for integration testing. Binds to port 0 and
/// exposes the actual bound port so a `ServerSupervisor` under test can
/// dial it.
pub struct MockHmonServer {
    listener: TcpListener,
}

impl MockHmonServer {
    /// Binds to a random available port on loopback.
    pub async fn bind() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(MockHmonServer { listener })
    }

    /// The address a `ServerSupervisor` under test should dial.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr().expect("bound listener has a local address")
    }

    /// Accepts the next incoming connection, handing back a peer for the
    /// test to drive. Each call accepts exactly one connection; call it
    /// again after a reconnect to accept the next attempt.
    pub async fn accept(&self) -> std::io::Result<MockHmonPeer> {
        let (stream, _peer_addr) = self.listener.accept().await?;
        Ok(MockHmonPeer::new(stream))
    }
}

/// Dials a listener under test, for scripts that exercise a
/// `ListenerSupervisor` being connected into by a remote orchestrator.
pub async fn dial(addr: SocketAddr) -> std::io::Result<MockHmonPeer> {
    let stream = tokio::net::TcpStream::connect(addr).await?;
    Ok(MockHmonPeer::new(stream))
}
