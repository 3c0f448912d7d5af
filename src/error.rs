//! Error types for the Chromium bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chromium_bridge::{Result, Error};
//!
//! async fn example(window: &Window) -> Result<()> {
//!     let title = window.title().await?;
//!     window.eval("document.body.style.background = 'black'").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::BrowserNotFound`], [`Error::ProcessLaunchFailed`] |
//! | Connection | [`Error::Connection`], [`Error::TransportUnavailable`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Cdp`], [`Error::BindingValidation`] |
//! | Execution | [`Error::ScriptError`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when launcher or window configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No usable Chromium-family binary.
    ///
    /// Returned when discovery finds no binary and none was configured,
    /// or the configured path does not exist.
    #[error("Chromium not found: {message}")]
    BrowserNotFound {
        /// Description of what was searched and where.
        message: String,
    },

    /// Failed to launch the browser process.
    ///
    /// Returned when the Chromium process fails to start.
    #[error("Failed to launch browser: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection failed.
    ///
    /// Returned when the pipe or websocket connection cannot be
    /// established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// DevTools endpoint never became reachable.
    ///
    /// Returned when discovery polling against `/json/list` exhausts its
    /// retry budget without finding a debuggable target.
    #[error("DevTools endpoint unavailable on port {port} after {waited_ms}ms")]
    TransportUnavailable {
        /// Debugging port that was polled.
        port: u16,
        /// Total milliseconds spent polling.
        waited_ms: u64,
    },

    /// Connection closed.
    ///
    /// Returned by any send or call issued after the transport was
    /// closed, and delivered to callers still waiting when it closes.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message shape.
    ///
    /// Returned when an inbound frame or a reply payload cannot be
    /// decoded into the expected structure.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Error reply from the browser.
    ///
    /// Returned when a command reply carries an `error` object instead
    /// of a `result`.
    #[error("CDP error {code}: {message}")]
    Cdp {
        /// Numeric error code from the browser.
        code: i64,
        /// Human-readable error message from the browser.
        message: String,
    },

    /// Page binding validation failed.
    ///
    /// Returned when the post-attach liveness probe does not come back
    /// with the expected shape. Fatal: the window is not handed out.
    #[error("Binding validation failed: {message}")]
    BindingValidation {
        /// Description of the failed probe.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Script evaluation threw in the page.
    ///
    /// Returned when `Runtime.evaluate` reports exception details.
    #[error("Script error: {message}")]
    ScriptError {
        /// Exception text from the page.
        message: String,
    },

    /// Command reply did not arrive within the caller's deadline.
    ///
    /// Only produced by the explicit timeout API; plain calls wait
    /// indefinitely.
    #[error("Request timeout: {method} after {timeout_ms}ms")]
    RequestTimeout {
        /// CDP method that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from endpoint discovery.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal channel closed while waiting for a reply.
    #[error("Channel closed: {0}")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Constructor Helpers
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a browser-not-found error.
    #[inline]
    pub fn browser_not_found(message: impl Into<String>) -> Self {
        Self::BrowserNotFound {
            message: message.into(),
        }
    }

    /// Creates a process launch error.
    #[inline]
    pub fn process_launch(message: impl Into<String>) -> Self {
        Self::ProcessLaunchFailed {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a transport-unavailable error.
    #[inline]
    pub fn transport_unavailable(port: u16, waited_ms: u64) -> Self {
        Self::TransportUnavailable { port, waited_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an error from a CDP error reply.
    #[inline]
    pub fn cdp(code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            code,
            message: message.into(),
        }
    }

    /// Creates a binding validation error.
    #[inline]
    pub fn binding_validation(message: impl Into<String>) -> Self {
        Self::BindingValidation {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            method: method.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Predicate Helpers
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if the connection is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::TransportUnavailable { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is an error reply from the browser.
    #[inline]
    #[must_use]
    pub fn is_cdp_error(&self) -> bool {
        matches!(self, Self::Cdp { .. })
    }

    /// Returns `true` if the window cannot be used at all.
    ///
    /// Fatal errors fail window construction instead of degrading it.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BindingValidation { .. }
                | Self::BrowserNotFound { .. }
                | Self::ProcessLaunchFailed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("missing url");
        assert_eq!(err.to_string(), "Configuration error: missing url");
    }

    #[test]
    fn test_browser_not_found_display() {
        let err = Error::browser_not_found("no candidates on PATH");
        assert_eq!(err.to_string(), "Chromium not found: no candidates on PATH");
    }

    #[test]
    fn test_transport_unavailable_display() {
        let err = Error::transport_unavailable(9222, 10_000);
        assert_eq!(
            err.to_string(),
            "DevTools endpoint unavailable on port 9222 after 10000ms"
        );
    }

    #[test]
    fn test_connection_closed_display() {
        let err = Error::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");
    }

    #[test]
    fn test_cdp_error_display() {
        let err = Error::cdp(-32601, "'Fake.method' wasn't found");
        assert_eq!(err.to_string(), "CDP error -32601: 'Fake.method' wasn't found");
    }

    #[test]
    fn test_request_timeout_display() {
        let err = Error::request_timeout("Runtime.evaluate", 5000);
        assert_eq!(
            err.to_string(),
            "Request timeout: Runtime.evaluate after 5000ms"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::request_timeout("Page.navigate", 100).is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_is_closed() {
        assert!(Error::ConnectionClosed.is_closed());
        assert!(!Error::connection("refused").is_closed());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("refused").is_connection_error());
        assert!(Error::transport_unavailable(9222, 500).is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("bad").is_connection_error());
    }

    #[test]
    fn test_is_cdp_error() {
        assert!(Error::cdp(-32000, "not allowed").is_cdp_error());
        assert!(!Error::protocol("truncated frame").is_cdp_error());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::binding_validation("probe returned undefined").is_fatal());
        assert!(Error::browser_not_found("nothing installed").is_fatal());
        assert!(!Error::script_error("ReferenceError: x").is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io = IoError::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
