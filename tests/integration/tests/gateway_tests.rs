//! Gateway Integration Tests
//!
//! Drive `GatewayClient` end to end against an in-process mock gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chord_gateway::events::{MessageCreate, Ready};
use chord_gateway::protocol::{CloseCode, Status, StatusUpdate};
use chord_gateway::{Activity, GatewayClient, GatewayError, OpCode, Payload};
use integration_tests::{
    fixtures, test_config, wait_until, within, FailingRest, MockGateway, RunningClient,
    TEST_TOKEN,
};
use serde_json::json;
use tokio::sync::mpsc;

fn client_for(gateway: &MockGateway) -> Arc<GatewayClient> {
    Arc::new(GatewayClient::new(gateway.rest(), test_config()))
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_and_session_capture() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    let identify = socket.hello(30_000).await.unwrap();
    assert_eq!(identify.token, TEST_TOKEN);
    assert!(!identify.compress);
    assert_eq!(identify.large_threshold, 50);
    assert_eq!(identify.shard, [0, 1]);
    assert_eq!(identify.presence.status, Status::Online);

    socket.dispatch("READY", 1, &fixtures::ready("abc")).await.unwrap();
    wait_until(|| {
        client
            .session()
            .and_then(|session| session.session_id())
            .is_some_and(|id| id == "abc")
    })
    .await
    .unwrap();

    let result = running.stop().await.unwrap();
    assert!(result.is_ok(), "{result:?}");
    assert!(!client.is_running());
    // The transient READY handler is gone once the connection ends.
    assert_eq!(client.registry().len("READY"), 0);
}

#[tokio::test]
async fn test_connect_url_selects_version_and_encoding() {
    let gateway = MockGateway::start().await.unwrap();
    let info = chord_rest::GatewayInfo {
        url: gateway.url(),
        shards: None,
    };
    let url = info.connect_url(chord_gateway::GATEWAY_VERSION).unwrap();
    assert_eq!(url.query(), Some("v=6&encoding=json"));
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test]
async fn test_single_heartbeat_without_sequence() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    let hello_sent = Instant::now();
    socket.hello(1000).await.unwrap();

    let mut heartbeats = Vec::new();
    let window = tokio::time::sleep_until((hello_sent + Duration::from_millis(1500)).into());
    tokio::pin!(window);
    loop {
        tokio::select! {
            () = &mut window => break,
            payload = socket.recv() => {
                let payload = payload.unwrap().unwrap();
                heartbeats.push((hello_sent.elapsed(), payload));
            }
        }
    }

    assert_eq!(heartbeats.len(), 1, "{heartbeats:?}");
    let (at, beat) = &heartbeats[0];
    assert_eq!(beat.opcode(), Some(OpCode::Heartbeat));
    assert!(beat.d.is_none());
    assert!(*at >= Duration::from_millis(1000), "heartbeat after {at:?}");

    running.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_uses_last_sequence() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.dispatch("GUILD_CREATE", 5, &fixtures::guild("Test Guild")).await.unwrap();
    socket.send(&Payload::new(OpCode::Heartbeat)).await.unwrap();

    let beat = socket.expect().await.unwrap();
    assert_eq!(beat.opcode(), Some(OpCode::Heartbeat));
    assert_eq!(beat.data::<u64>().unwrap(), 5);

    running.stop().await.unwrap().unwrap();
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[tokio::test]
async fn test_message_handler_fires_once() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let calls = Arc::clone(&calls);
        client
            .add_handler::<MessageCreate, _, _>(move |event| {
                let calls = Arc::clone(&calls);
                let tx = tx.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(event.message.content.clone());
                }
            })
            .unwrap();
    }

    let running = RunningClient::spawn(&client);
    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.dispatch("GUILD_CREATE", 1, &fixtures::guild("Test Guild")).await.unwrap();
    socket.dispatch("MESSAGE_CREATE", 2, &fixtures::message("hello")).await.unwrap();

    assert_eq!(within(rx.recv()).await.unwrap().as_deref(), Some("hello"));

    running.stop().await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_released_handler_is_not_invoked() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let released = {
        let tx = tx.clone();
        client
            .add_handler::<MessageCreate, _, _>(move |_| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send("released");
                }
            })
            .unwrap()
    };
    client
        .add_handler::<MessageCreate, _, _>(move |_| {
            let tx = tx.clone();
            async move {
                let _ = tx.send("kept");
            }
        })
        .unwrap();
    assert!(released.release());

    let running = RunningClient::spawn(&client);
    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.dispatch("MESSAGE_CREATE", 1, &fixtures::message("hi")).await.unwrap();

    assert_eq!(within(rx.recv()).await.unwrap(), Some("kept"));
    running.stop().await.unwrap().unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_handlers_survive_reconnect() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .add_handler::<Ready, _, _>(move |ready| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ready.session_id.clone());
            }
        })
        .unwrap();

    for session_id in ["first", "second"] {
        let running = RunningClient::spawn(&client);
        let mut socket = gateway.accept().await.unwrap();
        socket.hello(30_000).await.unwrap();
        socket.dispatch("READY", 1, &fixtures::ready(session_id)).await.unwrap();

        assert_eq!(within(rx.recv()).await.unwrap().as_deref(), Some(session_id));
        running.stop().await.unwrap().unwrap();
    }

    assert_eq!(client.registry().len("READY"), 1);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_opcode_is_protocol_error() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.send_json(&json!({"op": 42, "d": {"x": 1}})).await.unwrap();

    let err = running.finish().await.unwrap().unwrap_err();
    assert_eq!(err.activity(), Some(Activity::Protocol));
    assert!(matches!(err.root(), GatewayError::Protocol { op: 42, .. }));
    assert!(err.to_string().starts_with("run: "));
}

#[tokio::test]
async fn test_invalid_session_ends_run() {
    for resumable in [true, false] {
        let gateway = MockGateway::start().await.unwrap();
        let client = client_for(&gateway);
        let running = RunningClient::spawn(&client);

        let mut socket = gateway.accept().await.unwrap();
        socket.hello(30_000).await.unwrap();
        socket.send(&Payload::with_data(OpCode::InvalidSession, &resumable).unwrap()).await.unwrap();

        let err = running.finish().await.unwrap().unwrap_err();
        assert_eq!(err.activity(), Some(Activity::Protocol));
        assert!(
            matches!(err.root(), GatewayError::InvalidSession { resumable: r } if *r == resumable)
        );
    }
}

#[tokio::test]
async fn test_reconnect_request_is_ignored() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.send(&Payload::new(OpCode::Reconnect)).await.unwrap();
    socket.send(&Payload::new(OpCode::Heartbeat)).await.unwrap();

    assert_eq!(socket.expect().await.unwrap().opcode(), Some(OpCode::Heartbeat));
    assert!(client.is_running());
    running.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_close_frame_ends_run() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();
    socket.close(4004, "Authentication failed.").await.unwrap();

    let err = running.finish().await.unwrap().unwrap_err();
    assert_eq!(err.activity(), Some(Activity::Read));
    assert_eq!(err.close_code(), Some(CloseCode::AuthenticationFailed));
    assert!(!err.should_reconnect());
}

#[tokio::test]
async fn test_rest_failure_aborts_before_connect() {
    let gateway = MockGateway::start().await.unwrap();
    let client = GatewayClient::new(Arc::new(FailingRest { status: 401 }), test_config());

    let err = within(client.run(std::future::pending())).await.unwrap().unwrap_err();
    assert!(matches!(err, GatewayError::Rest(_)));
    assert!(!err.should_reconnect());
    assert!(!gateway.was_contacted(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_connect_failure_is_transport_error() {
    // Bind then drop so nothing is listening on the port.
    let url = {
        let gateway = MockGateway::start().await.unwrap();
        gateway.url()
    };
    let client = GatewayClient::new(Arc::new(integration_tests::StaticRest::new(url)), test_config());

    let err = within(client.run(std::future::pending())).await.unwrap().unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_closes_socket() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();

    let result = running.stop().await.unwrap();
    assert!(result.is_ok(), "{result:?}");
    assert!(socket.observes_close().await);
}

#[tokio::test]
async fn test_send_requires_connection() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);

    let err = client.update_status(&StatusUpdate::online()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotConnected));

    let running = RunningClient::spawn(&client);
    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();

    let idle = StatusUpdate::idle_since(chrono::Utc::now());
    client.update_status(&idle).await.unwrap();
    let update = socket.expect().await.unwrap();
    assert_eq!(update.opcode(), Some(OpCode::StatusUpdate));
    assert_eq!(update.data::<StatusUpdate>().unwrap(), idle);

    running.stop().await.unwrap().unwrap();
    let err = client.send(OpCode::Heartbeat, &()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotConnected));
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let gateway = MockGateway::start().await.unwrap();
    let client = client_for(&gateway);
    let running = RunningClient::spawn(&client);

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(30_000).await.unwrap();

    let err = client.run(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyRunning));
    assert!(client.is_running());

    running.stop().await.unwrap().unwrap();
}
