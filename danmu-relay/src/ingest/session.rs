//! One producer connection.
//!
//! A session reads frames strictly in arrival order, decodes each one and
//! pushes accepted messages into the shared buffer. A bad frame is logged
//! and dropped; only a transport failure, a close from the peer, or
//! relay shutdown ends the session.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use danmaku::{Decoded, IntakeStatistics, RetentionBuffer, decode};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// How long a shutting-down session waits for the peer to acknowledge close.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum number of payload characters echoed into rejection logs.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection or the stream ended.
    PeerClosed,
    /// The connection failed underneath the session.
    TransportFault(String),
    /// The relay is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::TransportFault(e) => write!(f, "transport fault: {e}"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Decoded and pushed into the buffer.
    Accepted,
    /// Well formed but not a chat event.
    Skipped,
    /// Malformed; logged and dropped.
    Rejected,
}

/// Server-side handle for one producer connection.
pub struct Session<S> {
    id: Uuid,
    peer: Option<SocketAddr>,
    ws: WebSocketStream<S>,
    buffer: Arc<RetentionBuffer>,
    stats: Arc<IntakeStatistics>,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session over an established WebSocket.
    pub fn new(
        ws: WebSocketStream<S>,
        buffer: Arc<RetentionBuffer>,
        stats: Arc<IntakeStatistics>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: None,
            ws,
            buffer,
            stats,
            state: SessionState::Open,
        }
    }

    /// Record the remote address for diagnostics.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read frames until the connection ends or `cancel_token` fires.
    pub async fn run(&mut self, cancel_token: CancellationToken) -> CloseReason {
        self.stats.record_session_opened();
        info!(session_id = %self.id, peer = ?self.peer, "Client connected");

        let reason = loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    self.close_for_shutdown().await;
                    break CloseReason::Shutdown;
                }

                frame = self.ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_payload(text.as_str().as_bytes());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.handle_payload(data.as_ref());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            // The close reply is flushed on the next read, which then ends the stream.
                            debug!(session_id = %self.id, ?frame, "Close frame received");
                        }
                        // Ping/Pong are answered by the protocol layer
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break classify_error(e),
                        None => break CloseReason::PeerClosed,
                    }
                }
            }
        };

        self.state = SessionState::Closed;
        self.stats
            .record_session_closed(matches!(reason, CloseReason::TransportFault(_)));
        info!(session_id = %self.id, peer = ?self.peer, reason = %reason, "Client disconnected");

        reason
    }

    /// Decode one frame payload and retain it if it is a chat event.
    pub fn handle_payload(&self, payload: &[u8]) -> FrameOutcome {
        let outcome = decode(payload);
        self.stats.record_decode(&outcome);

        match outcome {
            Ok(Decoded::Danmu(message)) => {
                info!(session_id = %self.id, "{}", message.formatted());
                if let Some(evicted) = self.buffer.push(message) {
                    trace!(session_id = %self.id, sender = %evicted.sender(), "Evicted oldest danmu");
                }
                FrameOutcome::Accepted
            }
            Ok(Decoded::NotApplicable) => FrameOutcome::Skipped,
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    error = %e,
                    payload = %preview(payload),
                    "Dropping malformed frame"
                );
                FrameOutcome::Rejected
            }
        }
    }

    /// Send a close frame and give the peer a moment to acknowledge it.
    async fn close_for_shutdown(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(session_id = %self.id, error = %e, "Failed to send close frame");
            return;
        }

        let drain = async {
            while let Some(Ok(frame)) = self.ws.next().await {
                if frame.is_text() || frame.is_binary() {
                    debug!(session_id = %self.id, "Discarding frame received during shutdown");
                }
            }
        };
        if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
            debug!(session_id = %self.id, "Peer did not acknowledge close");
        }
    }
}

fn classify_error(error: WsError) -> CloseReason {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => CloseReason::PeerClosed,
        other => CloseReason::TransportFault(other.to_string()),
    }
}

fn preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(PAYLOAD_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        out.push('…');
    }
    out
}
