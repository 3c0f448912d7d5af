//! Transport layer for CDP traffic.
//!
//! Two wire shapes carry the same JSON envelopes:
//!
//! ```text
//! ┌──────────────┐  fd 3 / fd 4, NUL-delimited   ┌──────────┐
//! │  Host (Rust) │◄─────────────────────────────►│ Chromium │
//! │              │                               │          │
//! │              │  ws://127.0.0.1:{port}/...    │          │
//! │              │◄─────────────────────────────►│          │
//! └──────────────┘  one text frame = one message └──────────┘
//! ```
//!
//! [`Transport`] normalizes both behind a frame-level send/receive
//! pair. The client splits it and owns both halves inside its dispatch
//! loop.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pipe` | NUL-delimited framing over inherited fds |
//! | `socket` | Endpoint discovery and websocket framing |
//! | `client` | Correlation engine and event fan-out |

// ============================================================================
// Submodules
// ============================================================================

/// NUL-delimited pipe framing.
pub mod pipe;

/// Endpoint discovery and websocket framing.
pub mod socket;

/// CDP client: correlation engine and event fan-out.
pub mod client;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

use pipe::{PipeReader, PipeWriter};
use socket::{SocketReader, SocketWriter};

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{CdpClient, EventCallback, SubscriberId};
pub use pipe::{FRAME_DELIMITER, FrameBuffer, encode_frame};
pub use socket::RetryPolicy;

// ============================================================================
// Transport
// ============================================================================

/// A connected CDP byte channel, either pipe- or websocket-backed.
///
/// Constructed by the launcher (pipe mode hands over the child's fds,
/// socket mode dials the discovered endpoint) and consumed by
/// [`CdpClient::connect`], which splits it into its two halves.
pub struct Transport {
    writer: TransportWriter,
    reader: TransportReader,
}

impl Transport {
    /// Wraps an established fd pair in NUL framing.
    ///
    /// `writer` is the half the browser reads from (its fd 3), `reader`
    /// the half it writes to (its fd 4).
    #[must_use]
    pub fn pipe(
        writer: impl AsyncWrite + Send + Unpin + 'static,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            writer: TransportWriter::Pipe(PipeWriter::new(Box::new(writer))),
            reader: TransportReader::Pipe(PipeReader::new(Box::new(reader))),
        }
    }

    /// Discovers the page endpoint on `port` and dials its websocket.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportUnavailable`](crate::Error::TransportUnavailable)
    ///   when discovery exhausts `policy`
    /// - [`Error::WebSocket`](crate::Error::WebSocket) when the dial fails
    pub async fn socket(port: u16, policy: &RetryPolicy) -> Result<Self> {
        let (writer, reader) = socket::connect(port, policy).await?;
        Ok(Self {
            writer: TransportWriter::Socket(writer),
            reader: TransportReader::Socket(reader),
        })
    }

    /// Splits into independently owned write and read halves.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (TransportWriter, TransportReader) {
        (self.writer, self.reader)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.writer.kind())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TransportWriter
// ============================================================================

/// Write half of a [`Transport`].
pub enum TransportWriter {
    /// NUL-framed pipe half.
    Pipe(PipeWriter<Box<dyn AsyncWrite + Send + Unpin>>),
    /// Websocket sink half.
    Socket(SocketWriter),
}

impl TransportWriter {
    /// Writes one whole frame.
    ///
    /// # Errors
    ///
    /// Propagates the backend's io or websocket error.
    pub async fn send_frame(&mut self, frame: &str) -> Result<()> {
        match self {
            Self::Pipe(writer) => writer.send_frame(frame).await,
            Self::Socket(writer) => writer.send_frame(frame).await,
        }
    }

    /// Shuts the write side down. Best effort, idempotent.
    pub async fn close(&mut self) {
        match self {
            Self::Pipe(writer) => writer.close().await,
            Self::Socket(writer) => writer.close().await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Pipe(_) => "pipe",
            Self::Socket(_) => "socket",
        }
    }
}

impl fmt::Debug for TransportWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportWriter").field(&self.kind()).finish()
    }
}

// ============================================================================
// TransportReader
// ============================================================================

/// Read half of a [`Transport`].
pub enum TransportReader {
    /// NUL-framed pipe half.
    Pipe(PipeReader<Box<dyn AsyncRead + Send + Unpin>>),
    /// Websocket stream half.
    Socket(SocketReader),
}

impl TransportReader {
    /// Returns the next frame, or `None` once the channel is gone.
    pub async fn next_frame(&mut self) -> Option<String> {
        match self {
            Self::Pipe(reader) => reader.next_frame().await,
            Self::Socket(reader) => reader.next_frame().await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Pipe(_) => "pipe",
            Self::Socket(_) => "socket",
        }
    }
}

impl fmt::Debug for TransportReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportReader").field(&self.kind()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
