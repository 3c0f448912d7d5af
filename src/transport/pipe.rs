//! NUL-delimited pipe transport.
//!
//! Chromium launched with `--remote-debugging-pipe` speaks CDP over two
//! inherited file descriptors: it reads commands from fd 3 and writes
//! replies and events to fd 4. Frames are UTF-8 JSON texts separated by
//! a single NUL byte.
//!
//! ```text
//!   {"id":0,"method":"Target.getTargets"}\0{"id":1,...}\0
//! ```
//!
//! The reader accumulates raw chunks and splits off every complete
//! frame in arrival order; a trailing partial stays buffered until its
//! delimiter arrives. Both halves are generic over
//! [`AsyncRead`]/[`AsyncWrite`] so tests can drive them with in-memory
//! pipes.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::error::Result;

// ============================================================================
// Framing
// ============================================================================

/// Frame separator used by the pipe protocol.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Read chunk size for the pipe reader.
const READ_CHUNK_SIZE: usize = 8192;

/// Encodes one frame for the wire: payload bytes plus the delimiter.
#[inline]
#[must_use]
pub fn encode_frame(frame: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frame.len() + 1);
    bytes.extend_from_slice(frame.as_bytes());
    bytes.push(FRAME_DELIMITER);
    bytes
}

/// Incremental splitter for NUL-delimited frames.
///
/// Bytes go in via [`feed`](Self::feed) in whatever chunks the OS
/// delivers; complete frames come out in arrival order. Incomplete
/// trailing data is kept until the next chunk completes it.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Creates an empty frame buffer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == FRAME_DELIMITER) {
            let rest = self.buf.split_off(pos + 1);
            let mut frame = std::mem::replace(&mut self.buf, rest);
            frame.pop();
            frames.push(String::from_utf8_lossy(&frame).into_owned());
        }
        frames
    }

    /// Number of buffered bytes not yet forming a complete frame.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// ============================================================================
// PipeReader
// ============================================================================

/// Read half of the pipe transport.
///
/// Owns the raw byte source and yields whole frames.
#[derive(Debug)]
pub struct PipeReader<R> {
    reader: R,
    buffer: FrameBuffer,
    ready: VecDeque<String>,
    eof: bool,
}

impl<R> PipeReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps a byte source.
    #[inline]
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::new(),
            ready: VecDeque::new(),
            eof: false,
        }
    }

    /// Returns the next complete frame, or `None` at end of stream.
    ///
    /// A read error counts as end of stream; a trailing partial frame
    /// at EOF is discarded.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(frame);
            }
            if self.eof {
                return None;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.reader.read(&mut chunk).await {
                Ok(0) => {
                    self.eof = true;
                    if !self.buffer.is_empty() {
                        debug!(
                            discarded_bytes = self.buffer.pending_len(),
                            "pipe closed mid-frame"
                        );
                    }
                }
                Ok(n) => {
                    let frames = self.buffer.feed(&chunk[..n]);
                    trace!(bytes = n, frames = frames.len(), "pipe chunk");
                    self.ready.extend(frames);
                }
                Err(error) => {
                    warn!(%error, "pipe read failed");
                    self.eof = true;
                }
            }
        }
    }
}

// ============================================================================
// PipeWriter
// ============================================================================

/// Write half of the pipe transport.
#[derive(Debug)]
pub struct PipeWriter<W> {
    writer: W,
}

impl<W> PipeWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps a byte sink.
    #[inline]
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one frame followed by the delimiter and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the pipe is gone.
    pub async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(&[FRAME_DELIMITER]).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shuts the write half down. Best effort.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_encode_frame_appends_delimiter() {
        let bytes = encode_frame(r#"{"id":0}"#);
        assert_eq!(bytes, b"{\"id\":0}\0");
    }

    #[test]
    fn test_feed_single_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.feed(b"{\"id\":0}\0");

        assert_eq!(frames, vec![r#"{"id":0}"#.to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_feed_multiple_frames_one_chunk() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.feed(b"first\0second\0third\0");

        assert_eq!(frames, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_feed_partial_then_completion() {
        let mut buffer = FrameBuffer::new();

        assert!(buffer.feed(b"{\"id\":").is_empty());
        assert_eq!(buffer.pending_len(), 6);

        let frames = buffer.feed(b"7}\0{\"me");
        assert_eq!(frames, vec![r#"{"id":7}"#]);
        assert_eq!(buffer.pending_len(), 4);
    }

    #[test]
    fn test_feed_delimiter_on_chunk_boundary() {
        let mut buffer = FrameBuffer::new();

        assert!(buffer.feed(b"frame-a").is_empty());
        let frames = buffer.feed(b"\0");
        assert_eq!(frames, vec!["frame-a"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_feed_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();
        for byte in b"ab\0cd\0" {
            out.extend(buffer.feed(&[*byte]));
        }
        assert_eq!(out, vec!["ab", "cd"]);
    }

    #[test]
    fn test_feed_multibyte_utf8_split_across_chunks() {
        let mut buffer = FrameBuffer::new();
        let encoded = encode_frame("{\"title\":\"héllo\"}");
        let (left, right) = encoded.split_at(11);

        assert!(buffer.feed(left).is_empty());
        let frames = buffer.feed(right);
        assert_eq!(frames, vec!["{\"title\":\"héllo\"}"]);
    }

    proptest! {
        #[test]
        fn prop_reassembly_survives_arbitrary_chunking(
            frames in prop::collection::vec("[^\u{0}]{0,40}", 0..8),
            chunk_sizes in prop::collection::vec(1usize..16, 1..32),
        ) {
            let mut wire = Vec::new();
            for frame in &frames {
                wire.extend(encode_frame(frame));
            }

            let mut buffer = FrameBuffer::new();
            let mut out = Vec::new();
            let mut offset = 0;
            let mut cursor = 0;
            while offset < wire.len() {
                let size = chunk_sizes[cursor % chunk_sizes.len()];
                cursor += 1;
                let end = usize::min(offset + size, wire.len());
                out.extend(buffer.feed(&wire[offset..end]));
                offset = end;
            }

            prop_assert_eq!(out, frames);
            prop_assert!(buffer.is_empty());
        }
    }

    #[tokio::test]
    async fn test_reader_yields_frames_across_writes() {
        let (host, mut remote) = tokio::io::duplex(1024);
        let mut reader = PipeReader::new(host);

        remote.write_all(b"{\"id\":0,\"resu").await.unwrap();
        let early = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            reader.next_frame(),
        )
        .await;
        assert!(early.is_err(), "partial frame must not be yielded");

        remote.write_all(b"lt\":{}}\0{\"method\":\"Page.loadEventFired\"}\0").await.unwrap();
        assert_eq!(reader.next_frame().await.unwrap(), r#"{"id":0,"result":{}}"#);
        assert_eq!(
            reader.next_frame().await.unwrap(),
            r#"{"method":"Page.loadEventFired"}"#
        );

        drop(remote);
        assert!(reader.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_with_mock_chunk_schedule() {
        let source = tokio_test::io::Builder::new()
            .read(b"{\"id\"")
            .read(b":3}\0{\"id\":4}\0{\"me")
            .read(b"thod\":\"x\"}\0")
            .build();

        let mut reader = PipeReader::new(source);
        assert_eq!(reader.next_frame().await.unwrap(), r#"{"id":3}"#);
        assert_eq!(reader.next_frame().await.unwrap(), r#"{"id":4}"#);
        assert_eq!(reader.next_frame().await.unwrap(), r#"{"method":"x"}"#);
        assert!(reader.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_discards_trailing_partial_at_eof() {
        let source = tokio_test::io::Builder::new()
            .read(b"whole\0dangling")
            .build();

        let mut reader = PipeReader::new(source);
        assert_eq!(reader.next_frame().await.unwrap(), "whole");
        assert!(reader.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_frames_and_flushes() {
        let (host, mut remote) = tokio::io::duplex(1024);
        let mut writer = PipeWriter::new(host);

        writer.send_frame(r#"{"id":0}"#).await.unwrap();
        writer.send_frame(r#"{"id":1}"#).await.unwrap();

        let mut seen = vec![0u8; 18];
        tokio::io::AsyncReadExt::read_exact(&mut remote, &mut seen)
            .await
            .unwrap();
        assert_eq!(&seen, b"{\"id\":0}\0{\"id\":1}\0");
    }

    #[tokio::test]
    async fn test_writer_send_after_peer_gone_fails() {
        let (host, remote) = tokio::io::duplex(64);
        drop(remote);

        let mut writer = PipeWriter::new(host);
        let result = writer.send_frame(r#"{"id":0}"#).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_round_trip_through_duplex() {
        let (host, remote) = tokio::io::duplex(4096);
        let (remote_read, remote_write) = tokio::io::split(remote);

        let mut writer = PipeWriter::new(host);
        let mut echo_reader = PipeReader::new(remote_read);
        let mut echo_writer = PipeWriter::new(remote_write);

        writer.send_frame(r#"{"id":9,"method":"Page.enable"}"#).await.unwrap();
        let frame = echo_reader.next_frame().await.unwrap();
        assert_eq!(frame, r#"{"id":9,"method":"Page.enable"}"#);

        echo_writer.send_frame(r#"{"id":9,"result":{}}"#).await.unwrap();
    }
}
