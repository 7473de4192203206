//! Integration tests for the Tether server: admission, presence, probes,
//! liveness expiry, and shutdown, all over real sockets.

use std::sync::Arc;
use std::time::Duration;

use tether::prelude::*;
use tether_transport::{
    ClientConnection, Connection, Frame, TransportError, connect,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SECRET: &[u8] = b"changeme";

// =========================================================================
// Helpers
// =========================================================================

struct TestServer {
    addr: String,
    presence: PresenceHandle,
    shutdown: CancellationToken,
    task: JoinHandle<Result<PresenceSnapshot, TetherError>>,
}

async fn start_server(config: SessionConfig) -> TestServer {
    let server = TetherServerBuilder::new()
        .bind("127.0.0.1:0")
        .session_config(config)
        .build(SharedSecretAuth::new(SECRET))
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    let presence = server.presence();
    let shutdown = server.shutdown_token();
    let task = tokio::spawn(server.run());
    TestServer {
        addr,
        presence,
        shutdown,
        task,
    }
}

fn token(uid: &str, ts: i64) -> String {
    SharedSecretAuth::new(SECRET)
        .mint(&Claims::new(uid, ts))
        .unwrap()
}

async fn connect_as(
    addr: &str,
    query: &str,
    bearer: &str,
) -> Result<ClientConnection, TransportError> {
    connect(&format!("ws://{addr}/ws?{query}"), bearer).await
}

/// Polls the registry until `done` holds, or panics after five seconds.
async fn wait_for(
    presence: &PresenceHandle,
    done: impl Fn(&PresenceSnapshot) -> bool,
) -> PresenceSnapshot {
    let poll = async {
        loop {
            let snapshot = presence.snapshot().await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("registry did not reach the expected state")
}

/// Reads until the server's close frame (or end of stream).
async fn read_until_closed(conn: &mut ClientConnection) -> Option<CloseCode> {
    loop {
        match conn.recv().await {
            Ok(Some(Frame::Close(close))) => {
                return Some(CloseCode::of(close.as_ref()));
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return None,
        }
    }
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn test_missing_ts_is_rejected_without_registry_events() {
    let server = start_server(SessionConfig::default()).await;

    let result = connect_as(&server.addr, "uid=42", &token("42", 100)).await;
    assert!(matches!(
        result,
        Err(TransportError::Rejected { status: 400, .. })
    ));

    let snapshot = server.presence.snapshot().await.unwrap();
    assert_eq!((snapshot.joins, snapshot.leaves), (0, 0));
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let server = start_server(SessionConfig::default()).await;

    let result = connect_as(&server.addr, "uid=42&ts=100", "garbage").await;
    assert!(matches!(
        result,
        Err(TransportError::Rejected { status: 401, .. })
    ));

    // Valid signature, but for someone else.
    let result =
        connect_as(&server.addr, "uid=42&ts=100", &token("7", 100)).await;
    assert!(matches!(
        result,
        Err(TransportError::Rejected { status: 401, .. })
    ));

    assert_eq!(server.presence.snapshot().await.unwrap().joins, 0);
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_admitted_peer_is_present_and_probes_are_acknowledged() {
    let server = start_server(SessionConfig::default()).await;
    let mut client =
        connect_as(&server.addr, "uid=42&ts=100", &token("42", 100))
            .await
            .expect("should be admitted");

    wait_for(&server.presence, |s| s.contains(&PeerId::from("42"))).await;

    client.send(Frame::Ping(b"1700000000000".to_vec())).await.unwrap();
    let pong = loop {
        match client.recv().await.unwrap() {
            Some(Frame::Pong(payload)) => break payload,
            Some(_) => {}
            None => panic!("stream ended before the acknowledgment"),
        }
    };
    assert_eq!(pong, b"1700000000000");

    client.close(CloseCode::NORMAL.frame("")).await.unwrap();
    read_until_closed(&mut client).await;

    let snapshot =
        wait_for(&server.presence, |s| s.leaves == 1).await;
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.joins, 1);
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_liveness_window() {
    let config = SessionConfig {
        liveness_window: Duration::from_millis(300),
        probe_interval: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let server = start_server(config).await;
    let mut client =
        connect_as(&server.addr, "uid=1&ts=5", &token("1", 5)).await.unwrap();

    wait_for(&server.presence, |s| s.joins == 1).await;
    let snapshot = wait_for(&server.presence, |s| s.leaves == 1).await;
    assert!(snapshot.is_empty());

    // The server just drops the transport; no close frame is sent.
    assert_eq!(read_until_closed(&mut client).await, None);
}

#[tokio::test]
async fn test_oversized_message_ends_session() {
    let server = start_server(SessionConfig::default()).await;
    let mut client =
        connect_as(&server.addr, "uid=1&ts=5", &token("1", 5)).await.unwrap();
    wait_for(&server.presence, |s| s.joins == 1).await;

    client.send(Frame::Data(vec![b'x'; 4096])).await.unwrap();

    let snapshot = wait_for(&server.presence, |s| s.leaves == 1).await;
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_reconnect_after_close_reuses_identifier() {
    let server = start_server(SessionConfig::default()).await;

    for round in 1..=2u64 {
        let mut client =
            connect_as(&server.addr, "uid=9&ts=1", &token("9", 1)).await.unwrap();
        wait_for(&server.presence, |s| s.joins == round).await;
        client.close(CloseCode::NORMAL.frame("")).await.unwrap();
        read_until_closed(&mut client).await;
        wait_for(&server.presence, |s| s.leaves == round).await;
    }

    assert!(server.presence.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_session_expiry_keeps_reconnected_peer_present() {
    let config = SessionConfig {
        liveness_window: Duration::from_millis(500),
        probe_interval: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let server = start_server(config).await;
    let peer = PeerId::from("9");

    // The old connection goes silent; the client has already reconnected.
    let _stale =
        connect_as(&server.addr, "uid=9&ts=1", &token("9", 1)).await.unwrap();
    wait_for(&server.presence, |s| s.joins == 1).await;
    let mut live =
        connect_as(&server.addr, "uid=9&ts=2", &token("9", 2)).await.unwrap();
    wait_for(&server.presence, |s| s.joins == 2).await;

    let stop = CancellationToken::new();
    let prober = {
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.is_cancelled() {
                live.send(Frame::Ping(b"1".to_vec())).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            live
        })
    };

    let snapshot = wait_for(&server.presence, |s| s.leaves == 1).await;
    assert!(snapshot.contains(&peer), "live session must stay present");

    stop.cancel();
    let mut live = prober.await.unwrap();
    live.close(CloseCode::NORMAL.frame("")).await.unwrap();
    read_until_closed(&mut live).await;

    let snapshot = wait_for(&server.presence, |s| s.leaves == 2).await;
    assert!(snapshot.is_empty());
}

// =========================================================================
// Load test against a real server
// =========================================================================

#[tokio::test]
async fn test_interrupt_removes_every_simulated_peer_once() {
    let server = start_server(SessionConfig::default()).await;
    let signal = ShutdownSignal::new();
    let config = LoadConfig {
        addr: server.addr.clone(),
        peers: 5,
        probe_interval: Duration::from_millis(50),
        ..LoadConfig::default()
    };
    let coordinator =
        Coordinator::new(config, Arc::new(SharedSecretAuth::new(SECRET)));
    let run = {
        let signal = signal.clone();
        tokio::spawn(async move { coordinator.run(signal).await })
    };

    let snapshot = wait_for(&server.presence, |s| s.len() == 5).await;
    for uid in ["1", "2", "3", "4", "5"] {
        assert!(snapshot.contains(&PeerId::from(uid)));
    }

    signal.trigger();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.interrupted, 5);

    let snapshot = wait_for(&server.presence, |s| s.leaves >= 5).await;
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.joins, 5);
    assert_eq!(snapshot.leaves, 5, "no duplicate leaves");
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_sessions_with_going_away() {
    let server = start_server(SessionConfig::default()).await;
    let mut client =
        connect_as(&server.addr, "uid=3&ts=1", &token("3", 1)).await.unwrap();
    wait_for(&server.presence, |s| s.joins == 1).await;

    server.shutdown.cancel();
    assert_eq!(
        read_until_closed(&mut client).await,
        Some(CloseCode::GOING_AWAY)
    );

    let snapshot = server.task.await.unwrap().expect("clean stop");
    assert!(snapshot.is_empty());
    assert_eq!((snapshot.joins, snapshot.leaves), (1, 1));
}

#[tokio::test]
async fn test_shutdown_with_no_sessions() {
    let server = start_server(SessionConfig::default()).await;
    server.shutdown.cancel();
    let snapshot = server.task.await.unwrap().unwrap();
    assert_eq!(snapshot.joins, 0);
}

#[tokio::test]
async fn test_invalid_config_fails_build() {
    let config = SessionConfig {
        liveness_window: Duration::from_millis(500),
        probe_interval: Duration::from_secs(1),
        ..SessionConfig::default()
    };
    let result = TetherServerBuilder::new()
        .bind("127.0.0.1:0")
        .session_config(config)
        .build(SharedSecretAuth::new(SECRET))
        .await;
    assert!(matches!(result, Err(TetherError::Session(_))));
}
