//! WebSocket transport with endpoint discovery.
//!
//! Chromium launched with `--remote-debugging-port` exposes an HTTP
//! discovery endpoint next to the actual protocol socket. Connecting
//! is a two-step dance:
//!
//! 1. Poll `GET http://127.0.0.1:{port}/json/list` until it returns a
//!    non-empty target array (the browser needs a moment to bring the
//!    endpoint up after spawn).
//! 2. Open a WebSocket to the first target's `webSocketDebuggerUrl`.
//!
//! Polling is bounded by a [`RetryPolicy`]; exhausting it surfaces
//! [`Error::TransportUnavailable`](crate::Error::TransportUnavailable)
//! instead of spinning forever. One text frame equals one CDP envelope.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::DebugTarget;

// ============================================================================
// Constants
// ============================================================================

/// Delay between discovery polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Discovery polls before giving up (50 x 200ms = 10s).
const DEFAULT_POLL_ATTEMPTS: u32 = 50;

/// Established websocket stream type.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded retry schedule for endpoint discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of polls.
    pub attempts: u32,
    /// Delay between polls.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy with explicit attempts and interval.
    #[inline]
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Upper bound on total time spent polling.
    #[inline]
    #[must_use]
    pub const fn total_wait(&self) -> Duration {
        Duration::from_millis(self.interval.as_millis() as u64 * self.attempts as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Polls the discovery endpoint until a debuggable page shows up.
///
/// Returns the `webSocketDebuggerUrl` of the FIRST listed target.
///
/// # Errors
///
/// Returns [`Error::TransportUnavailable`] when the policy is
/// exhausted without finding a target.
pub async fn discover(port: u16, policy: &RetryPolicy) -> Result<String> {
    let url = format!("http://127.0.0.1:{port}/json/list");
    let started = Instant::now();

    for attempt in 0..policy.attempts {
        match fetch_targets(&url).await {
            Ok(targets) => match targets.first() {
                Some(first) => {
                    if let Some(ws_url) = &first.web_socket_debugger_url {
                        debug!(attempt, %ws_url, "discovered DevTools target");
                        return Ok(ws_url.clone());
                    }
                    trace!(attempt, target = %first.id, "first target not debuggable yet");
                }
                None => trace!(attempt, "endpoint up, target list empty"),
            },
            Err(error) => trace!(attempt, %error, "discovery poll failed"),
        }
        tokio::time::sleep(policy.interval).await;
    }

    let waited_ms = started.elapsed().as_millis() as u64;
    warn!(port, waited_ms, "discovery exhausted");
    Err(Error::transport_unavailable(port, waited_ms))
}

/// One discovery poll.
async fn fetch_targets(url: &str) -> Result<Vec<DebugTarget>> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(Error::connection(format!(
            "discovery endpoint returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

// ============================================================================
// Connect
// ============================================================================

/// Discovers the page endpoint and opens the protocol websocket.
///
/// # Errors
///
/// - [`Error::TransportUnavailable`] when discovery exhausts its policy
/// - [`Error::WebSocket`] when the dial itself fails
pub async fn connect(port: u16, policy: &RetryPolicy) -> Result<(SocketWriter, SocketReader)> {
    let ws_url = discover(port, policy).await?;
    info!(%ws_url, "connecting to DevTools websocket");

    let (stream, _response) = connect_async(ws_url.as_str()).await?;
    let (sink, stream) = stream.split();

    Ok((SocketWriter { sink }, SocketReader { stream }))
}

// ============================================================================
// SocketReader
// ============================================================================

/// Read half of the websocket transport.
pub struct SocketReader {
    stream: SplitStream<WsStream>,
}

impl SocketReader {
    /// Returns the next text frame, or `None` once the socket is gone.
    ///
    /// Control frames are skipped; a Close frame or read error ends the
    /// stream.
    pub async fn next_frame(&mut self) -> Option<String> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => return Some(text.to_string()),
                Ok(WsMessage::Binary(bytes)) => {
                    return Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                Ok(WsMessage::Close(_)) => {
                    debug!("websocket close frame");
                    return None;
                }
                Ok(_) => trace!("ignoring websocket control frame"),
                Err(error) => {
                    warn!(%error, "websocket read failed");
                    return None;
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for SocketReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketReader").finish_non_exhaustive()
    }
}

// ============================================================================
// SocketWriter
// ============================================================================

/// Write half of the websocket transport.
pub struct SocketWriter {
    sink: SplitSink<WsStream, WsMessage>,
}

impl SocketWriter {
    /// Sends one envelope as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`](crate::Error::WebSocket) if the
    /// socket is gone.
    pub async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.sink.send(WsMessage::Text(frame.into())).await?;
        Ok(())
    }

    /// Sends a Close frame and shuts the sink down. Best effort.
    pub async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

impl std::fmt::Debug for SocketWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketWriter").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
