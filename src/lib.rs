//! Chromium Bridge - DevTools-driven app window library.
//!
//! This library turns a stock Chromium-family browser into an
//! application window host, driven entirely over the DevTools protocol.
//!
//! # Architecture
//!
//! The bridge follows a host-page model:
//!
//! - **Host End (Rust)**: Spawns the browser, owns the DevTools
//!   connection, correlates commands with replies
//! - **Page End (JavaScript)**: An injected `chromiumBridge` global
//!   exposing a typed IPC channel to page code
//!
//! Key design principles:
//!
//! - Each [`Window`] owns: Chromium process + DevTools connection +
//!   target session
//! - Commands and replies correlate by id; replies may arrive in any
//!   order
//! - The page runtime reinstalls itself on every new document, so IPC
//!   survives navigation
//! - Transport is pluggable: a private fd pair or a local debugging
//!   port
//!
//! # Quick Start
//!
//! ```no_run
//! use chromium_bridge::{Launcher, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Resolve a browser binary and open an app window
//!     let launcher = Launcher::builder().build()?;
//!     let window = launcher.window("https://example.com")
//!         .window_size(1280, 800)
//!         .open()
//!         .await?;
//!
//!     // Evaluate in the page
//!     let title = window.title().await?;
//!     println!("Page title: {}", title);
//!
//!     // Typed IPC with page code listening via chromiumBridge.ipc.on
//!     let reply = window.ipc().request("greet", json!({"name": "world"})).await?;
//!     println!("Page replied: {}", reply);
//!
//!     window.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Page entities: [`Window`], [`PageIpc`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`launcher`] | Launcher factory and configuration |
//! | [`protocol`] | DevTools message types (internal) |
//! | [`transport`] | Pipe/websocket transport layer (internal) |
//!
//! # Features
//!
//! - **Dual transport**: private pipe pair (fds 3/4) or an ephemeral
//!   debugging port, selected per window
//! - **Typed page IPC**: request/reply and fire-and-forget messaging
//!   with page code
//! - **Navigation-proof runtime**: the page global is reinstalled for
//!   every document and execution context
//! - **Isolated profiles**: every window runs in its own temporary
//!   profile directory

// ============================================================================
// Modules
// ============================================================================

/// Page entities: Window, PageIpc.
///
/// This module contains the core types for driving an open window:
///
/// - [`Window`] - App window (owns the browser process)
/// - [`PageIpc`] - Typed message channel with page code
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Launcher factory and configuration.
///
/// Use [`Launcher::builder()`] to create a configured launcher.
pub mod launcher;

/// DevTools protocol message types.
///
/// Internal module defining envelope, reply and event structures.
pub mod protocol;

/// DevTools transport layer.
///
/// Internal module handling pipe framing, endpoint discovery and the
/// correlation client. [`CdpClient`] is re-exported for raw protocol
/// access.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{ListenerId, PageIpc, Window, WindowBuilder};

// Launcher types
pub use launcher::{ConnectMode, Launcher, LauncherBuilder, WindowOptions};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::VersionInfo;

// Transport types
pub use transport::{CdpClient, RetryPolicy, SubscriberId, Transport};
