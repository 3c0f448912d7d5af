//! App window and page bridge module.
//!
//! This module provides the types sitting between the protocol client
//! and the application:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Window`] | App window (owns Chromium process + DevTools connection) |
//! | [`PageIpc`] | Typed message channel between host and page script |
//!
//! # Example
//!
//! ```no_run
//! use chromium_bridge::{Launcher, Result};
//!
//! # async fn example() -> Result<()> {
//! let launcher = Launcher::builder().build()?;
//!
//! let window = launcher.window("https://example.com").open().await?;
//!
//! window.ipc().on("query", |data| {
//!     Some(serde_json::json!({"echo": data.clone()}))
//! });
//! let reply = window.ipc().request("hello", serde_json::json!(null)).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Injected page runtime script assembly.
pub(crate) mod inject;

/// Host side of the page IPC channel.
pub mod ipc;

/// Target binding and session scope.
pub(crate) mod session;

/// App window management.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

pub use ipc::{ListenerId, PageIpc};
pub use window::{Window, WindowBuilder};

pub(crate) use inject::RuntimeScript;
pub(crate) use session::{BindMode, Session};
pub(crate) use window::ProcessGuard;
