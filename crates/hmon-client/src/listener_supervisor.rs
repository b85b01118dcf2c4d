//! Acceptor mode: binds one TCP listener and spawns a `ConnectionActor` per
//! accepted socket. Unlike `ServerSupervisor` there is no retry loop — a
//! dropped connection is gone for good, and its `SessionId` is never reused.

use crate::connection::{self, ActorRequest};
use crate::event::Event;
use crate::session_id::SessionId;
use hmon_transport::{Framed, Framer, HandshakeDriver};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub struct ListenerSupervisor;

impl ListenerSupervisor {
    /// Binds synchronously so a bad address fails `start_listener` directly
    /// instead of surfacing as a confusing later disconnect event.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        Ok((listener, bound))
    }

    /// Spawns the accept loop. `on_accept` is called with each freshly
    /// minted `SessionId` and the sender half of its command channel —
    /// the orchestrator uses it to register the session before the
    /// connection actor starts reading, so a command issued the instant
    /// `SessionConnected` is observed always has somewhere to go.
    pub fn spawn(
        listener: TcpListener,
        events: mpsc::UnboundedSender<Event>,
        mut shutdown: watch::Receiver<bool>,
        on_accept: Arc<dyn Fn(SessionId, mpsc::UnboundedSender<ActorRequest>) + Send + Sync>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                spawn_connection(stream, peer, events.clone(), on_accept.clone());
                            }
                            Err(e) => warn!(error = %e, "accept failed"),
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    events: mpsc::UnboundedSender<Event>,
    on_accept: Arc<dyn Fn(SessionId, mpsc::UnboundedSender<ActorRequest>) + Send + Sync>,
) {
    tokio::spawn(async move {
        let mut framed = Framed::new(stream, Framer);
        if let Err(e) = HandshakeDriver::run(&mut framed).await {
            warn!(peer = %peer, error = %e, "handshake failed for accepted connection, dropping silently");
            return;
        }

        let session_id = SessionId::new();
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        on_accept(session_id, commands_tx);

        info!(session_id = %session_id, peer = %peer, "accepted");
        connection::run(framed, session_id, &mut commands_rx, events).await;
    });
}
