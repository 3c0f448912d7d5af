//! Browser launching and lifecycle management.
//!
//! This module provides the main entry point for opening app windows.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Launcher`] | Factory for opening app windows |
//! | [`LauncherBuilder`] | Fluent configuration builder |
//! | [`WindowOptions`] | Window launch options |
//! | [`ConnectMode`] | DevTools transport selection |
//!
//! # Example
//!
//! ```no_run
//! use chromium_bridge::{Launcher, Result};
//!
//! # async fn example() -> Result<()> {
//! let launcher = Launcher::builder()
//!     .binary("/usr/bin/chromium")
//!     .build()?;
//!
//! let window = launcher.window("https://example.com")
//!     .window_size(1280, 800)
//!     .open()
//!     .await?;
//!
//! let title = window.title().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Browser binary discovery.
pub(crate) mod browser;

/// Core launcher implementation.
pub mod core;

/// Window launch options and transport selection.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{Launcher, LauncherBuilder};
pub use options::{ConnectMode, WindowOptions};
