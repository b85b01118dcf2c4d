//! Dialer-mode handshake scenarios: a successful handshake surfaces
//! `SessionConnected`, and a version mismatch surfaces `SessionDisconnected`
//! without ever reaching the connection actor.

use std::time::Duration;

use futures_util::StreamExt;
use hmon::{DisconnectReason, Event, EventKind, Orchestrator, OrchestratorOptions};
use hmon_test_support::MockHmonServer;

const WAIT: Duration = Duration::from_secs(2);

async fn next_event(stream: &mut (impl futures_util::Stream<Item = Event> + Unpin)) -> Event {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("event did not arrive in time")
        .expect("event stream ended unexpectedly")
}

#[tokio::test]
async fn successful_handshake_emits_session_connected() {
    let server = MockHmonServer::bind().await.unwrap();
    let orchestrator = Orchestrator::new(OrchestratorOptions::default());
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let session_id = orchestrator.add_server("127.0.0.1", server.local_addr().port(), Some("primary".to_owned())).await;

    let mut peer = tokio::time::timeout(WAIT, server.accept()).await.unwrap().unwrap();
    peer.run_handshake().await.unwrap();

    let event = next_event(&mut events).await;
    assert_eq!(event.session_id, session_id);
    assert!(matches!(event.kind, EventKind::SessionConnected));

    orchestrator.dispose().await;
}

#[tokio::test]
async fn protocol_mismatch_emits_session_disconnected_without_a_session_connected() {
    let server = MockHmonServer::bind().await.unwrap();
    let mut options = OrchestratorOptions::default();
    options.retry_policy.initial_delay = Duration::from_secs(60);
    let orchestrator = Orchestrator::new(options);
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let session_id = orchestrator.add_server("127.0.0.1", server.local_addr().port(), None).await;

    let mut peer = tokio::time::timeout(WAIT, server.accept()).await.unwrap().unwrap();
    // A deliberately unsupported version makes `HandshakeDriver::run` fail on
    // the production side before `UsingProtocol` is ever exchanged.
    peer.send_handshake_line("SupportedProtocols=99").await.unwrap();

    let event = next_event(&mut events).await;
    assert_eq!(event.session_id, session_id);
    match event.kind {
        EventKind::SessionDisconnected(DisconnectReason::HandshakeFailed(detail)) => {
            assert!(detail.contains("protocol"), "unexpected disconnect detail: {detail}");
        }
        other => panic!("expected SessionDisconnected, got {other:?}"),
    }

    orchestrator.dispose().await;
}
