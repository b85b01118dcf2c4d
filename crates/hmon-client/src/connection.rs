//! One live HMON connection: reads frames off the wire, decodes them,
//! resolves correlated replies against the pending-request table, and
//! publishes everything else onto the shared event channel. Writes happen
//! inline in this same task, so there is exactly one writer per socket.

use crate::error::CommandError;
use crate::event::{DisconnectReason, Event, EventKind};
use crate::session_id::SessionId;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use hmon_protocol::{encode_envelope, Command, InboundMessage};
use hmon_transport::{FrameError, Framed, Framer};
use std::collections::HashMap;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// One outstanding request this actor placed on the wire, awaiting a
/// correlated reply.
struct PendingRequest {
    respond_to: oneshot::Sender<Result<InboundMessage, CommandError>>,
    deadline: Instant,
}

/// How the orchestrator wants to hear back about a submitted command.
pub enum ActorReply {
    /// `StopFacts` / `BumpFacts`: the protocol carries no correlated
    /// response for these, so the caller only learns whether the frame was
    /// written.
    Written(oneshot::Sender<Result<(), CommandError>>),
    /// Every other outbound command: wait for the reply bearing the same
    /// `UID`.
    Correlated(oneshot::Sender<Result<InboundMessage, CommandError>>),
}

/// A command submitted by the orchestrator for this connection to send.
pub struct ActorRequest {
    pub command: Command,
    pub reply: ActorReply,
    pub deadline: Instant,
}

const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

/// Drives one connection until the socket closes or a frame/handshake error
/// makes it unrecoverable. Returns the reason so the caller (a supervisor)
/// can decide whether to reconnect.
pub async fn run<S>(
    mut framed: Framed<S, Framer>,
    session_id: SessionId,
    commands: &mut mpsc::UnboundedReceiver<ActorRequest>,
    events: mpsc::UnboundedSender<Event>,
) -> DisconnectReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _ = events.send(Event::new(session_id, EventKind::SessionConnected));

    let mut pending: HashMap<String, PendingRequest> = HashMap::new();
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        if let Err(reason) = handle_frame(&bytes, session_id, &mut pending, &events) {
                            break reason;
                        }
                    }
                    Some(Err(e)) => break frame_error_reason(e),
                    None => break DisconnectReason::ClosedByPeer,
                }
            }
            request = commands.recv() => {
                match request {
                    Some(request) => {
                        if let Err(reason) = send_request(&mut framed, request, &mut pending).await {
                            break reason;
                        }
                    }
                    None => break DisconnectReason::Disposed,
                }
            }
            _ = sweep.tick() => {
                sweep_expired(&mut pending);
            }
        }
    };

    for (_, pending_request) in pending.drain() {
        let _ = pending_request.respond_to.send(Err(CommandError::ConnectionClosed));
    }
    let _ = events.send(Event::new(session_id, EventKind::SessionDisconnected(reason.clone())));
    reason
}

fn frame_error_reason(e: FrameError) -> DisconnectReason {
    match e {
        FrameError::Io(e) => DisconnectReason::Io(e.to_string()),
        other => DisconnectReason::Framing(other.to_string()),
    }
}

async fn send_request<S>(
    framed: &mut Framed<S, Framer>,
    request: ActorRequest,
    pending: &mut HashMap<String, PendingRequest>,
) -> Result<(), DisconnectReason>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let uid = request.command.requires_uid.then(|| Uuid::new_v4().to_string());
    let bytes = encode_envelope(request.command.name, request.command.args, uid.as_deref());

    if framed.send(Bytes::from(bytes)).await.is_err() {
        match request.reply {
            ActorReply::Written(respond_to) => {
                let _ = respond_to.send(Err(CommandError::ConnectionClosed));
            }
            ActorReply::Correlated(respond_to) => {
                let _ = respond_to.send(Err(CommandError::ConnectionClosed));
            }
        }
        return Err(DisconnectReason::ClosedByPeer);
    }

    match request.reply {
        ActorReply::Written(respond_to) => {
            let _ = respond_to.send(Ok(()));
        }
        ActorReply::Correlated(respond_to) => {
            let uid = uid.expect("a correlated reply always follows a UID-bearing command");
            pending.insert(uid, PendingRequest { respond_to, deadline: request.deadline });
        }
    }
    Ok(())
}

fn handle_frame(
    bytes: &[u8],
    session_id: SessionId,
    pending: &mut HashMap<String, PendingRequest>,
    events: &mpsc::UnboundedSender<Event>,
) -> Result<(), DisconnectReason> {
    let message = match hmon_protocol::decode_envelope(bytes) {
        Ok(Some(message)) => message,
        Ok(None) => {
            trace!("ignoring frame with an unrecognized command name");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
            return Ok(());
        }
    };

    if let Some(uid) = message.uid() {
        if let Some(request) = pending.remove(uid) {
            let reply = rejection_or_reply(message);
            let _ = request.respond_to.send(reply);
            return Ok(());
        }
    }

    let _ = events.send(Event::new(session_id, to_event_kind(message)));
    Ok(())
}

fn rejection_or_reply(message: InboundMessage) -> Result<InboundMessage, CommandError> {
    match message {
        InboundMessage::UnknownCommand(p) => Err(CommandError::Rejected { kind: "UnknownCommand", detail: p.detail }),
        InboundMessage::MalformedCommand(p) => Err(CommandError::Rejected { kind: "MalformedCommand", detail: p.detail }),
        InboundMessage::InvalidSyntax(p) => Err(CommandError::Rejected { kind: "InvalidSyntax", detail: p.detail }),
        InboundMessage::DisallowedUid(p) => Err(CommandError::Rejected { kind: "DisallowedUID", detail: p.detail }),
        other => Ok(other),
    }
}

fn to_event_kind(message: InboundMessage) -> EventKind {
    match message {
        InboundMessage::Facts(p) => EventKind::FactsReceived { facts: p.facts },
        InboundMessage::Notification(p) => {
            EventKind::NotificationReceived { event_id: p.event_id, event_name: p.event_name, tid: p.tid }
        }
        InboundMessage::LastKnownState(p) => EventKind::LastKnownStateReceived { facts: p.facts },
        InboundMessage::Subscribed(p) => EventKind::SubscribedResponseReceived { events: p.events },
        InboundMessage::RideConnection(p) => {
            EventKind::RideConnectionReceived { connected: p.connected, address: p.address, port: p.port }
        }
        InboundMessage::UserMessage(p) => EventKind::UserMessageReceived { text: p.text },
        InboundMessage::UnknownCommand(p) => EventKind::UnknownCommand { detail: p.detail },
        InboundMessage::MalformedCommand(p) => EventKind::MalformedCommand { detail: p.detail },
        InboundMessage::InvalidSyntax(p) => EventKind::InvalidSyntax { detail: p.detail },
        InboundMessage::DisallowedUid(p) => EventKind::DisallowedUid { detail: p.detail },
    }
}

fn sweep_expired(pending: &mut HashMap<String, PendingRequest>) {
    let now = Instant::now();
    let expired: Vec<String> = pending
        .iter()
        .filter(|(_, request)| request.deadline <= now)
        .map(|(uid, _)| uid.clone())
        .collect();
    for uid in expired {
        if let Some(request) = pending.remove(&uid) {
            debug!(uid = %uid, "command timed out waiting for a correlated reply");
            drop(request.respond_to);
        }
    }
}
