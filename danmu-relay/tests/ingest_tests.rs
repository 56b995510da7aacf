//! End-to-end tests for the ingest listener.
//!
//! These tests bind a real listener on an ephemeral loopback port and drive
//! it with `tokio-tungstenite` clients.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use danmaku::{IntakeStatistics, RetentionBuffer};
use danmu_relay::ingest::{IngestConfig, IngestListener};
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;

struct Relay {
    addr: SocketAddr,
    buffer: Arc<RetentionBuffer>,
    stats: Arc<IntakeStatistics>,
    token: CancellationToken,
    task: JoinHandle<danmu_relay::Result<()>>,
}

impl Relay {
    async fn start(capacity: usize) -> Self {
        let config = IngestConfig {
            port: 0,
            shutdown_timeout: Duration::from_secs(2),
            ..IngestConfig::default()
        };
        let buffer = Arc::new(RetentionBuffer::new(capacity));
        let stats = Arc::new(IntakeStatistics::new());

        let listener = IngestListener::bind(config, Arc::clone(&buffer), Arc::clone(&stats))
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().unwrap();
        let token = listener.cancel_token();
        let task = tokio::spawn(listener.run());

        Self {
            addr,
            buffer,
            stats,
            token,
            task,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Poll until `accepted` reaches `expected` or time runs out.
    async fn wait_for_accepted(&self, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.stats.accepted() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "timed out waiting for {expected} accepted frames, got {}",
                self.stats.accepted()
            )
        });
    }

    async fn stop(self) {
        self.token.cancel();
        self.task
            .await
            .expect("listener task panicked")
            .expect("listener failed");
    }
}

fn danmu(nickname: &str, content: &str) -> Message {
    Message::Text(
        serde_json::json!({
            "type": "danmu",
            "data": {
                "nickname": nickname,
                "content": content,
                "time": "20:15:00",
                "liveId": "live-1",
                "userToken": format!("token-{nickname}")
            }
        })
        .to_string()
        .into(),
    )
}

#[tokio::test]
async fn accepts_valid_danmu() {
    let relay = Relay::start(100).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    ws.send(danmu("bob", "hello")).await.unwrap();
    relay.wait_for_accepted(1).await;

    let latest = relay.buffer.latest().unwrap();
    assert_eq!(latest.sender(), "bob");
    assert_eq!(latest.content(), "hello");
    assert_eq!(latest.live_id(), "live-1");
    assert_eq!(latest.formatted(), "[20:15:00] bob [token-bob]\nhello");

    ws.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn malformed_frame_does_not_close_connection() {
    let relay = Relay::start(100).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    ws.send(Message::Text("{not json".into())).await.unwrap();
    ws.send(danmu("alice", "still here")).await.unwrap();
    relay.wait_for_accepted(1).await;

    // The same connection keeps working.
    ws.send(danmu("alice", "and again")).await.unwrap();
    relay.wait_for_accepted(2).await;

    let contents: Vec<String> = relay
        .buffer
        .snapshot()
        .iter()
        .map(|m| m.content().to_string())
        .collect();
    assert_eq!(contents, ["still here", "and again"]);

    let stats = relay.stats.snapshot();
    assert_eq!(stats.parse_errors, 1);
    assert_eq!(stats.sessions_closed, 0);

    ws.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn large_frame_is_accepted_without_dropping_connection() {
    let relay = Relay::start(100).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    let long = "x".repeat(100 * 1024);
    ws.send(danmu("bob", &long)).await.unwrap();
    ws.send(danmu("bob", "short")).await.unwrap();
    relay.wait_for_accepted(2).await;

    let snapshot = relay.buffer.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].content().len(), 100 * 1024);
    assert_eq!(snapshot[1].content(), "short");

    let stats = relay.stats.snapshot();
    assert_eq!(stats.transport_faults, 0);
    assert_eq!(stats.sessions_closed, 0);

    ws.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn non_danmu_frames_are_skipped_silently() {
    let relay = Relay::start(100).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    ws.send(Message::Text(r#"{"type":"heartbeat"}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"danmu","data":{}}"#.into()))
        .await
        .unwrap();
    ws.send(danmu("carol", "real")).await.unwrap();
    relay.wait_for_accepted(1).await;

    let stats = relay.stats.snapshot();
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.rejected, 0);
    assert_eq!(relay.buffer.len(), 1);

    ws.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn concurrent_sessions_share_bounded_buffer() {
    let relay = Relay::start(100).await;

    let clients: Vec<_> = ["s0", "s1"]
        .into_iter()
        .map(|name| {
            let url = relay.url();
            tokio::spawn(async move {
                let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
                for i in 0..60 {
                    ws.send(danmu(name, &i.to_string())).await.unwrap();
                }
                ws.close(None).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            })
        })
        .collect();
    for client in clients {
        client.await.unwrap();
    }

    relay.wait_for_accepted(120).await;

    let snapshot = relay.buffer.snapshot();
    assert_eq!(snapshot.len(), 100);
    assert_eq!(relay.buffer.total_pushed(), 120);

    let unique: HashSet<(String, String)> = snapshot
        .iter()
        .map(|m| (m.sender().to_string(), m.content().to_string()))
        .collect();
    assert_eq!(unique.len(), 100, "no duplicates expected");

    for name in ["s0", "s1"] {
        let seq: Vec<u32> = snapshot
            .iter()
            .filter(|m| m.sender() == name)
            .map(|m| m.content().parse().unwrap())
            .collect();
        assert!(seq.windows(2).all(|w| w[1] == w[0] + 1), "{name}: {seq:?}");
        assert_eq!(seq.last(), Some(&59));
    }

    relay.stop().await;
}

#[tokio::test]
async fn one_session_failing_does_not_affect_another() {
    let relay = Relay::start(100).await;

    let (mut steady, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();
    let (mut doomed, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    doomed.send(danmu("doomed", "bye")).await.unwrap();
    relay.wait_for_accepted(1).await;
    // Vanish without a closing handshake.
    drop(doomed);

    steady.send(danmu("steady", "still fine")).await.unwrap();
    relay.wait_for_accepted(2).await;
    assert_eq!(relay.buffer.latest().unwrap().sender(), "steady");

    steady.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let relay = Relay::start(100).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(relay.url()).await.unwrap();

    ws.send(danmu("dave", "last words")).await.unwrap();
    relay.wait_for_accepted(1).await;

    relay.token.cancel();

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("server should close the connection");
    assert!(matches!(frame, Some(Ok(Message::Close(_)))), "{frame:?}");
    while let Some(Ok(_)) = ws.next().await {}

    let addr = relay.addr;
    let buffer = Arc::clone(&relay.buffer);
    let stats = Arc::clone(&relay.stats);
    relay.stop().await;

    // Already accepted danmu survive shutdown.
    assert_eq!(buffer.len(), 1);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.sessions_closed, 1);
    assert_eq!(snapshot.active_sessions, 0);

    // The listening socket is gone.
    assert!(
        tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .is_err()
    );
}
