//! Listener-mode scenarios: a remote dialing into our listener, a
//! correlated `GetFacts` round-trip, an unsolicited `Notification`, and a
//! command that never gets a reply.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::StreamExt;
use hmon::{Event, EventKind, FactKind, Orchestrator, OrchestratorOptions};
use hmon_test_support::dial;
use serde_json::json;

const WAIT: Duration = Duration::from_secs(2);

async fn next_event(stream: &mut (impl futures_util::Stream<Item = Event> + Unpin)) -> Event {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("event did not arrive in time")
        .expect("event stream ended unexpectedly")
}

#[tokio::test]
async fn accepted_connection_answers_get_facts() {
    let orchestrator = Orchestrator::new(OrchestratorOptions::default());
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let listener_id = orchestrator
        .start_listener(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .unwrap();
    let addr = orchestrator.listener_local_addr(listener_id).await.unwrap();

    let mut peer = dial(addr).await.unwrap();
    peer.run_handshake().await.unwrap();

    let connected = next_event(&mut events).await;
    let session_id = connected.session_id;
    assert!(matches!(connected.kind, EventKind::SessionConnected));

    let orchestrator2 = orchestrator.clone();
    let get_facts = tokio::spawn(async move {
        orchestrator2.get_facts(session_id, &[FactKind::Workspace], None, None).await
    });

    let (name, args) = tokio::time::timeout(WAIT, peer.recv_envelope()).await.unwrap().unwrap();
    assert_eq!(name, "GetFacts");
    assert_eq!(args["Facts"], json!([3]));
    let uid = args["UID"].as_str().expect("GetFacts carries a correlation UID").to_owned();

    peer.send_envelope(
        "Facts",
        json!({
            "UID": uid,
            "Facts": [{
                "ID": 3,
                "Name": "Workspace",
                "Value": {
                    "WSID": "CLEAR WS",
                    "Available": 1000,
                    "Used": 500,
                    "Compactions": 2,
                    "GarbageCollections": 10,
                    "Sediment": 0,
                    "AllocationHeap": 4096,
                    "TrapSize": 0,
                }
            }]
        }),
    )
    .await
    .unwrap();

    let response = tokio::time::timeout(WAIT, get_facts).await.unwrap().unwrap().unwrap();
    assert_eq!(response.facts.len(), 1);
    assert_eq!(response.facts[0].kind(), FactKind::Workspace);

    // A correlated reply must not also surface as a public `FactsReceived`.
    let stray = tokio::time::timeout(Duration::from_millis(100), events.next()).await;
    assert!(stray.is_err(), "correlated Facts reply leaked onto the event stream");

    orchestrator.dispose().await;
}

#[tokio::test]
async fn unsolicited_notification_reaches_the_event_stream() {
    let orchestrator = Orchestrator::new(OrchestratorOptions::default());
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let listener_id = orchestrator
        .start_listener(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .unwrap();
    let addr = orchestrator.listener_local_addr(listener_id).await.unwrap();

    let mut peer = dial(addr).await.unwrap();
    peer.run_handshake().await.unwrap();
    let connected = next_event(&mut events).await;
    assert!(matches!(connected.kind, EventKind::SessionConnected));

    peer.send_envelope("Notification", json!({"Event": {"ID": 3, "Name": "UntrappedSignal"}, "Tid": 7}))
        .await
        .unwrap();

    let event = next_event(&mut events).await;
    match event.kind {
        EventKind::NotificationReceived { event_id, event_name, tid } => {
            assert_eq!(event_id, 3);
            assert_eq!(event_name, "UntrappedSignal");
            assert_eq!(tid, Some(7));
        }
        other => panic!("expected NotificationReceived, got {other:?}"),
    }

    orchestrator.dispose().await;
}

#[tokio::test]
async fn get_facts_times_out_when_the_remote_never_replies() {
    let orchestrator = Orchestrator::new(OrchestratorOptions::default());
    let mut events = Box::pin(orchestrator.events().await.unwrap());

    let listener_id = orchestrator
        .start_listener(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .unwrap();
    let addr = orchestrator.listener_local_addr(listener_id).await.unwrap();

    let mut peer = dial(addr).await.unwrap();
    peer.run_handshake().await.unwrap();
    let connected = next_event(&mut events).await;
    let session_id = connected.session_id;

    let result = orchestrator
        .get_facts(session_id, &[FactKind::Host], Some(Duration::from_millis(50)), None)
        .await;
    assert!(matches!(result, Err(hmon::CommandError::Timeout)));

    // Drain the request the actor did write, so the mock doesn't need to care.
    let _ = tokio::time::timeout(WAIT, peer.recv_envelope()).await;

    orchestrator.dispose().await;
}
