//! The aggregate root: owns every `ServerSupervisor`, `ListenerSupervisor`
//! and `ConnectionActor` the application has asked for, fans their events
//! into one ordered stream, and serves the correlated command API of
//! spec.md §4.7 on top of the per-connection pending-request table that
//! lives inside `connection::run`.

use crate::connection::{ActorReply, ActorRequest};
use crate::error::{CommandError, OrchestratorError};
use crate::event::{Event, EventKind};
use crate::fact_cache::FactCache;
use crate::listener_id::ListenerId;
use crate::listener_supervisor::ListenerSupervisor;
use crate::retry::RetryPolicy;
use crate::server_supervisor::ServerSupervisor;
use crate::session_id::SessionId;
use dashmap::DashMap;
use hmon_protocol as proto;
use hmon_protocol::{Fact, FactKind, InboundMessage, SubscriptionEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tunables for one `Orchestrator` instance (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub retry_policy: RetryPolicy,
    pub fact_cache_ttl: Duration,
    pub default_command_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        OrchestratorOptions {
            retry_policy: RetryPolicy::default(),
            fact_cache_ttl: Duration::from_secs(5 * 60),
            default_command_timeout: Duration::from_secs(30),
        }
    }
}

/// The correlated reply to `get_facts` / the initial ack of `poll_facts`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactsResponse {
    pub facts: Vec<Fact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastKnownStateResponse {
    pub facts: Vec<Fact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscribedResponse {
    pub events: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RideConnectionResponse {
    pub connected: bool,
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    /// Registered through `add_server`; the entry survives reconnects, only
    /// `remove_server`/`dispose` ever take it out of the registry.
    Dialer,
    /// Accepted through a listener; removed the moment it disconnects.
    Listener,
}

struct SessionEntry {
    commands: mpsc::UnboundedSender<ActorRequest>,
    kind: SessionKind,
}

type Registry = Arc<DashMap<SessionId, SessionEntry>>;

struct DialerHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
    local_addr: SocketAddr,
}

struct Inner {
    options: OrchestratorOptions,
    registry: Registry,
    fact_cache: FactCache,
    dialers: RwLock<std::collections::HashMap<SessionId, DialerHandle>>,
    listeners: RwLock<std::collections::HashMap<ListenerId, ListenerHandle>>,
    raw_events: mpsc::UnboundedSender<Event>,
    public_events: RwLock<Option<mpsc::UnboundedReceiver<Event>>>,
    pump: RwLock<Option<tokio::task::JoinHandle<()>>>,
    disposed: std::sync::atomic::AtomicBool,
}

/// The library's aggregate root (spec.md §4.7). Cheaply `Clone`-able — an
/// `Arc` around shared state, so the application can pass one around its
/// task graph the way it would any other shared service handle.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (public_tx, public_rx) = mpsc::unbounded_channel();
        let registry: Registry = Arc::new(DashMap::new());
        let fact_cache = FactCache::new(options.fact_cache_ttl);

        let pump = tokio::spawn(pump_events(raw_rx, public_tx, registry.clone(), fact_cache.clone()));

        Orchestrator {
            inner: Arc::new(Inner {
                options,
                registry,
                fact_cache,
                dialers: RwLock::new(std::collections::HashMap::new()),
                listeners: RwLock::new(std::collections::HashMap::new()),
                raw_events: raw_tx,
                public_events: RwLock::new(Some(public_rx)),
                pump: RwLock::new(Some(pump)),
                disposed: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Registers a dialer target and starts its connect-with-retry loop.
    /// The returned `SessionId` is stable across every reconnection of this
    /// logical target, until `remove_server` or `dispose`.
    pub async fn add_server(&self, host: impl Into<String>, port: u16, name: Option<String>) -> SessionId {
        let session_id = SessionId::new();
        let address = format!("{}:{port}", host.into());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        self.inner
            .registry
            .insert(session_id, SessionEntry { commands: commands_tx, kind: SessionKind::Dialer });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = ServerSupervisor::spawn(
            address.clone(),
            session_id,
            self.inner.options.retry_policy,
            commands_rx,
            self.inner.raw_events.clone(),
            shutdown_rx,
        );
        self.inner.dialers.write().await.insert(session_id, DialerHandle { shutdown: shutdown_tx, task });
        info!(session_id = %session_id, address = %address, name = ?name, "registered dialer target");
        session_id
    }

    /// Stops the dial-retry loop for `session_id` and disposes its actor.
    pub async fn remove_server(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        let handle = self
            .inner
            .dialers
            .write()
            .await
            .remove(&session_id)
            .ok_or(OrchestratorError::UnknownSession(session_id))?;
        let _ = handle.shutdown.send(true);
        let _ = handle.task.await;
        self.inner.registry.remove(&session_id);
        self.inner.fact_cache.clear_session(session_id).await;
        Ok(())
    }

    /// Binds a TCP listener and starts accepting connections. Each accepted,
    /// handshaken socket gets a fresh `SessionId`; there is no reconnection.
    pub async fn start_listener(&self, addr: SocketAddr) -> Result<ListenerId, OrchestratorError> {
        let (listener, local_addr) = ListenerSupervisor::bind(addr).await.map_err(OrchestratorError::Io)?;
        let listener_id = ListenerId::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let registry = self.inner.registry.clone();
        let on_accept: Arc<dyn Fn(SessionId, mpsc::UnboundedSender<ActorRequest>) + Send + Sync> =
            Arc::new(move |session_id, commands_tx| {
                registry.insert(session_id, SessionEntry { commands: commands_tx, kind: SessionKind::Listener });
            });

        let task = ListenerSupervisor::spawn(listener, self.inner.raw_events.clone(), shutdown_rx, on_accept);
        self.inner
            .listeners
            .write()
            .await
            .insert(listener_id, ListenerHandle { shutdown: shutdown_tx, task, local_addr });
        info!(listener_id = %listener_id, addr = %local_addr, "listening");
        Ok(listener_id)
    }

    /// The address a listener actually bound to (useful when `addr` asked
    /// for an ephemeral port).
    pub async fn listener_local_addr(&self, listener_id: ListenerId) -> Option<SocketAddr> {
        self.inner.listeners.read().await.get(&listener_id).map(|h| h.local_addr)
    }

    pub async fn get_facts(
        &self,
        session_id: SessionId,
        facts: &[FactKind],
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<FactsResponse, CommandError> {
        let message = self.submit_correlated(session_id, proto::get_facts(facts), timeout, cancel).await?;
        match message {
            InboundMessage::Facts(p) => Ok(FactsResponse { facts: p.facts }),
            _ => Err(CommandError::UnexpectedResponse),
        }
    }

    pub async fn get_last_known_state(
        &self,
        session_id: SessionId,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<LastKnownStateResponse, CommandError> {
        let message =
            self.submit_correlated(session_id, proto::get_last_known_state(), timeout, cancel).await?;
        match message {
            InboundMessage::LastKnownState(p) => Ok(LastKnownStateResponse { facts: p.facts }),
            _ => Err(CommandError::UnexpectedResponse),
        }
    }

    /// Starts periodic pushes on the remote side; the correlated reply is
    /// the initial snapshot, and subsequent pushes arrive as
    /// `EventKind::FactsReceived` on `events()`.
    pub async fn poll_facts(
        &self,
        session_id: SessionId,
        facts: &[FactKind],
        interval: Duration,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<FactsResponse, CommandError> {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        let message = self
            .submit_correlated(session_id, proto::poll_facts(facts, interval_ms), timeout, cancel)
            .await?;
        match message {
            InboundMessage::Facts(p) => Ok(FactsResponse { facts: p.facts }),
            _ => Err(CommandError::UnexpectedResponse),
        }
    }

    /// `StopFacts` MUST NOT carry a `UID` (spec.md §4.3); the caller only
    /// learns whether the frame reached the wire.
    pub async fn stop_facts_polling(
        &self,
        session_id: SessionId,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<(), CommandError> {
        self.submit_uncorrelated(session_id, proto::stop_facts_polling(), timeout, cancel).await
    }

    /// `BumpFacts` likewise carries no `UID`.
    pub async fn bump_facts(
        &self,
        session_id: SessionId,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<(), CommandError> {
        self.submit_uncorrelated(session_id, proto::bump_facts(), timeout, cancel).await
    }

    /// Replaces the remote's current event subscription set.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        events: &[SubscriptionEvent],
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<SubscribedResponse, CommandError> {
        let message = self.submit_correlated(session_id, proto::subscribe(events), timeout, cancel).await?;
        match message {
            InboundMessage::Subscribed(p) => Ok(SubscribedResponse { events: p.events }),
            _ => Err(CommandError::UnexpectedResponse),
        }
    }

    pub async fn connect_ride(
        &self,
        session_id: SessionId,
        address: &str,
        port: u16,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<RideConnectionResponse, CommandError> {
        let message = self
            .submit_correlated(session_id, proto::connect_ride(Some(address), Some(port)), timeout, cancel)
            .await?;
        ride_response(message)
    }

    /// There is no dedicated wire command to close the secondary channel —
    /// `ConnectRide` with address/port both omitted is the documented
    /// disconnect signal (spec.md §9, resolved in SPEC_FULL.md §C).
    pub async fn disconnect_ride(
        &self,
        session_id: SessionId,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<RideConnectionResponse, CommandError> {
        let message =
            self.submit_correlated(session_id, proto::connect_ride(None, None), timeout, cancel).await?;
        ride_response(message)
    }

    /// Non-blocking cache read; never initiates I/O (spec.md §4.7
    /// Command/Query separation).
    pub async fn get_fact(&self, session_id: SessionId, kind: FactKind) -> Option<Fact> {
        self.inner.fact_cache.get(session_id, kind).await
    }

    /// As `get_fact`, plus the `Instant` the cached value was recorded.
    pub async fn get_fact_with_timestamp(
        &self,
        session_id: SessionId,
        kind: FactKind,
    ) -> Option<(Fact, std::time::Instant)> {
        self.inner.fact_cache.get_with_timestamp(session_id, kind).await
    }

    /// Takes ownership of the unified event stream. Can only be called
    /// once; a second call returns `EventStreamAlreadyTaken`.
    pub async fn events(&self) -> Result<impl futures_util::Stream<Item = Event>, OrchestratorError> {
        let receiver = self
            .inner
            .public_events
            .write()
            .await
            .take()
            .ok_or(OrchestratorError::EventStreamAlreadyTaken)?;
        Ok(tokio_stream::wrappers::UnboundedReceiverStream::new(receiver))
    }

    /// Stops the listener and every dialer, disposes every actor, and closes
    /// the event stream. Idempotent.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        for (_, handle) in self.inner.listeners.write().await.drain() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
        for (_, handle) in self.inner.dialers.write().await.drain() {
            let _ = handle.shutdown.send(true);
            let _ = handle.task.await;
        }
        self.inner.registry.clear();

        if let Some(pump) = self.inner.pump.write().await.take() {
            pump.abort();
        }
        // Dropping the last `raw_events` sender would otherwise happen only
        // when `Inner` itself drops; taking the public receiver out signals
        // end-of-stream to any consumer still polling `events()`.
        self.inner.public_events.write().await.take();
    }

    fn commands_sender(&self, session_id: SessionId) -> Result<mpsc::UnboundedSender<ActorRequest>, CommandError> {
        self.inner
            .registry
            .get(&session_id)
            .map(|entry| entry.commands.clone())
            .ok_or(CommandError::UnknownSession(session_id))
    }

    async fn submit_correlated(
        &self,
        session_id: SessionId,
        command: proto::Command,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<InboundMessage, CommandError> {
        let sender = self.commands_sender(session_id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let deadline = std::time::Instant::now() + timeout.unwrap_or(self.inner.options.default_command_timeout);
        let request = ActorRequest { command, reply: ActorReply::Correlated(reply_tx), deadline };
        sender.send(request).map_err(|_| CommandError::ConnectionClosed)?;
        await_reply(reply_rx, deadline, cancel).await
    }

    async fn submit_uncorrelated(
        &self,
        session_id: SessionId,
        command: proto::Command,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<(), CommandError> {
        let sender = self.commands_sender(session_id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let deadline = std::time::Instant::now() + timeout.unwrap_or(self.inner.options.default_command_timeout);
        let request = ActorRequest { command, reply: ActorReply::Written(reply_tx), deadline };
        sender.send(request).map_err(|_| CommandError::ConnectionClosed)?;
        await_written(reply_rx, deadline, cancel).await
    }
}

fn ride_response(message: InboundMessage) -> Result<RideConnectionResponse, CommandError> {
    match message {
        InboundMessage::RideConnection(p) => {
            Ok(RideConnectionResponse { connected: p.connected, address: p.address, port: p.port })
        }
        _ => Err(CommandError::UnexpectedResponse),
    }
}

async fn await_reply(
    reply_rx: oneshot::Receiver<Result<InboundMessage, CommandError>>,
    deadline: std::time::Instant,
    cancel: Option<CancellationToken>,
) -> Result<InboundMessage, CommandError> {
    let sleep = tokio::time::sleep_until(deadline.into());
    tokio::pin!(sleep);
    tokio::select! {
        res = reply_rx => res.unwrap_or(Err(CommandError::Timeout)),
        () = &mut sleep => Err(CommandError::Timeout),
        () = cancelled(&cancel) => Err(CommandError::Cancelled),
    }
}

async fn await_written(
    reply_rx: oneshot::Receiver<Result<(), CommandError>>,
    deadline: std::time::Instant,
    cancel: Option<CancellationToken>,
) -> Result<(), CommandError> {
    let sleep = tokio::time::sleep_until(deadline.into());
    tokio::pin!(sleep);
    tokio::select! {
        res = reply_rx => res.unwrap_or(Err(CommandError::Timeout)),
        () = &mut sleep => Err(CommandError::Timeout),
        () = cancelled(&cancel) => Err(CommandError::Cancelled),
    }
}

/// Never resolves if `cancel` is `None`, so this arm can never win the
/// `select!` above when the caller declined to pass a token — there is no
/// separate code path for "uncancellable".
async fn cancelled(cancel: &Option<CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn pump_events(
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    public_tx: mpsc::UnboundedSender<Event>,
    registry: Registry,
    fact_cache: FactCache,
) {
    while let Some(event) = raw_rx.recv().await {
        if let EventKind::FactsReceived { facts } = &event.kind {
            fact_cache.record(event.session_id, facts.clone()).await;
        }
        if matches!(event.kind, EventKind::SessionDisconnected(_)) {
            let drop_entry = registry.get(&event.session_id).is_some_and(|e| e.kind == SessionKind::Listener);
            if drop_entry {
                registry.remove(&event.session_id);
                fact_cache.clear_session(event.session_id).await;
            }
        }
        let _ = public_tx.send(event);
    }
}
