//! Ingest listener.
//!
//! Accepts TCP connections, performs the WebSocket handshake and runs an
//! independent [`Session`] for each. No keepalive pings are sent, so idle
//! producers are never dropped by the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use danmaku::{IntakeStatistics, RetentionBuffer};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::IngestConfig;
use super::session::Session;
use crate::error::Result;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// WebSocket listener feeding the retention buffer.
pub struct IngestListener {
    config: IngestConfig,
    listener: TcpListener,
    buffer: Arc<RetentionBuffer>,
    stats: Arc<IntakeStatistics>,
    cancel_token: CancellationToken,
    sessions: TaskTracker,
}

impl IngestListener {
    /// Bind the listener socket.
    pub async fn bind(
        config: IngestConfig,
        buffer: Arc<RetentionBuffer>,
        stats: Arc<IntakeStatistics>,
    ) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;

        Ok(Self {
            config,
            listener,
            buffer,
            stats,
            cancel_token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Accept connections until cancelled, then wait for sessions to close.
    pub async fn run(self) -> Result<()> {
        info!("Danmu ingest listening on ws://{}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        let Self {
            config,
            listener,
            sessions,
            ..
        } = self;
        drop(listener);
        sessions.close();

        info!(
            open_sessions = sessions.len(),
            "Danmu ingest stopped accepting, waiting for sessions"
        );
        if tokio::time::timeout(config.shutdown_timeout, sessions.wait())
            .await
            .is_err()
        {
            warn!(
                open_sessions = sessions.len(),
                "Sessions still open after {:?}", config.shutdown_timeout
            );
        }
        info!("Danmu ingest stopped");

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let ws_config = self.config.websocket_config();
        let buffer = Arc::clone(&self.buffer);
        let stats = Arc::clone(&self.stats);
        let cancel_token = self.cancel_token.clone();

        self.sessions.spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }

            let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config));
            let ws = tokio::select! {
                _ = cancel_token.cancelled() => return,
                result = handshake => match result {
                    Ok(ws) => ws,
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "WebSocket handshake failed");
                        return;
                    }
                },
            };

            let mut session = Session::new(ws, buffer, stats).with_peer(peer);
            session.run(cancel_token).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IngestConfig {
        IngestConfig {
            port: 0,
            shutdown_timeout: Duration::from_secs(2),
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = IngestListener::bind(
            test_config(),
            Arc::new(RetentionBuffer::default()),
            Arc::new(IntakeStatistics::new()),
        )
        .await
        .unwrap();

        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_after_shutdown() {
        let listener = IngestListener::bind(
            test_config(),
            Arc::new(RetentionBuffer::default()),
            Arc::new(IntakeStatistics::new()),
        )
        .await
        .unwrap();

        let token = listener.cancel_token();
        assert!(!token.is_cancelled());
        let task = tokio::spawn(listener.run());

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("listener should stop promptly")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failed_handshake_does_not_stop_listener() {
        use tokio::io::AsyncWriteExt;

        let stats = Arc::new(IntakeStatistics::new());
        let listener = IngestListener::bind(
            test_config(),
            Arc::new(RetentionBuffer::default()),
            Arc::clone(&stats),
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let token = listener.cancel_token();
        let task = tokio::spawn(listener.run());

        // Plain HTTP garbage instead of an upgrade request.
        let mut raw = TcpStream::connect(addr).await.unwrap();
        raw.write_all(b"hello\r\n\r\n").await.unwrap();
        drop(raw);

        // The listener still accepts WebSocket clients afterwards.
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws.close(None).await.unwrap();

        token.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(stats.snapshot().sessions_opened, 1);
    }
}
