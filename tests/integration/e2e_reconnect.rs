//! A dialer session keeps the same `SessionId` across a dropped connection
//! and the automatic reconnect that follows.

use std::time::Duration;

use futures_util::StreamExt;
use hmon::{DisconnectReason, Event, EventKind, Orchestrator, OrchestratorOptions, RetryPolicy};
use hmon_test_support::MockHmonServer;

const WAIT: Duration = Duration::from_secs(2);

async fn next_event(stream: &mut (impl futures_util::Stream<Item = Event> + Unpin)) -> Event {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("event did not arrive in time")
        .expect("event stream ended unexpectedly")
}

#[tokio::test]
async fn reconnect_reuses_the_same_session_id() {
    let server = MockHmonServer::bind().await.unwrap();
    let options = OrchestratorOptions {
        retry_policy: RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        },
        ..OrchestratorOptions::default()
    };
    let orchestrator = Orchestrator::new(options);
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let session_id = orchestrator.add_server("127.0.0.1", server.local_addr().port(), None).await;

    let mut first = tokio::time::timeout(WAIT, server.accept()).await.unwrap().unwrap();
    first.run_handshake().await.unwrap();

    let connected = next_event(&mut events).await;
    assert_eq!(connected.session_id, session_id);
    assert!(matches!(connected.kind, EventKind::SessionConnected));

    // The remote goes away; the dialer should notice and eventually redial.
    first.disconnect();

    let disconnected = next_event(&mut events).await;
    assert_eq!(disconnected.session_id, session_id);
    assert!(matches!(disconnected.kind, EventKind::SessionDisconnected(_)));
    if let EventKind::SessionDisconnected(reason) = disconnected.kind {
        assert!(!matches!(reason, DisconnectReason::Disposed));
    }

    let mut second = tokio::time::timeout(WAIT, server.accept()).await.unwrap().unwrap();
    second.run_handshake().await.unwrap();

    let reconnected = next_event(&mut events).await;
    assert_eq!(reconnected.session_id, session_id);
    assert!(matches!(reconnected.kind, EventKind::SessionConnected));

    orchestrator.dispose().await;
}
