//! Dialer mode: owns one remote address, keeps the same `SessionId` across
//! however many times the socket has to be re-established, and retries with
//! jittered exponential backoff after every disconnect.

use crate::connection::{self, ActorRequest};
use crate::event::{DisconnectReason, Event, EventKind};
use crate::retry::RetryPolicy;
use crate::session_id::SessionId;
use hmon_transport::{Framed, Framer, HandshakeDriver};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub struct ServerSupervisor;

impl ServerSupervisor {
    /// Spawns the dial-retry loop and returns immediately. The loop runs
    /// until `shutdown` is set to `true`.
    pub fn spawn(
        address: String,
        session_id: SessionId,
        retry_policy: RetryPolicy,
        commands: mpsc::UnboundedReceiver<ActorRequest>,
        events: mpsc::UnboundedSender<Event>,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(run(address, session_id, retry_policy, commands, events, shutdown))
    }
}

async fn run(
    address: String,
    session_id: SessionId,
    retry_policy: RetryPolicy,
    mut commands: mpsc::UnboundedReceiver<ActorRequest>,
    events: mpsc::UnboundedSender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match dial(&address).await {
            Ok(framed) => {
                attempt = 0;
                info!(session_id = %session_id, address = %address, "dialed");
                tokio::select! {
                    _ = connection::run(framed, session_id, &mut commands, events.clone()) => {}
                    _ = shutdown.changed() => {
                        let _ = events.send(Event::new(session_id, EventKind::SessionDisconnected(DisconnectReason::Disposed)));
                        return;
                    }
                }
            }
            Err(DialError::Connect(e)) => {
                warn!(session_id = %session_id, address = %address, error = %e, "dial failed");
                let _ = events.send(Event::new(
                    session_id,
                    EventKind::SessionDisconnected(DisconnectReason::Io(e.to_string())),
                ));
            }
            Err(DialError::Handshake(e)) => {
                warn!(session_id = %session_id, address = %address, error = %e, "handshake failed");
                let _ = events.send(Event::new(
                    session_id,
                    EventKind::SessionDisconnected(DisconnectReason::HandshakeFailed(e.to_string())),
                ));
            }
        }

        if *shutdown.borrow() {
            return;
        }

        let delay = retry_policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// Distinguishes a transport-level connect failure (spec.md §7
/// `ConnectionFailed`) from a handshake failure (`HandshakeFailed`) so the
/// `SessionDisconnected` reason reported to the application names the right
/// one.
enum DialError {
    Connect(std::io::Error),
    Handshake(hmon_transport::HandshakeError),
}

async fn dial(address: &str) -> Result<Framed<TcpStream, Framer>, DialError> {
    let stream = TcpStream::connect(address).await.map_err(DialError::Connect)?;
    let mut framed = Framed::new(stream, Framer);
    HandshakeDriver::run(&mut framed).await.map_err(DialError::Handshake)?;
    Ok(framed)
}
