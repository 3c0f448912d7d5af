//! Browser command-line options and configuration.
//!
//! Provides a type-safe interface for configuring the Chromium process
//! backing a window: the URL to open, window dimensions, the debugging
//! transport, and additional command-line arguments.
//!
//! # Example
//!
//! ```ignore
//! use chromium_bridge::{ConnectMode, WindowOptions};
//!
//! let options = WindowOptions::new("https://example.com")
//!     .with_window_size(1280, 800)
//!     .with_connect(ConnectMode::Port);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use url::Url;

// ============================================================================
// ConnectMode
// ============================================================================

/// Physical channel carrying the DevTools connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectMode {
    /// Inherited file descriptor pair, NUL-delimited frames.
    ///
    /// Connects to the browser endpoint; requires a unix host.
    #[default]
    Pipe,

    /// Loopback websocket discovered via the `/json/list` endpoint.
    ///
    /// Connects straight to the page endpoint; works everywhere.
    Port,
}

impl ConnectMode {
    /// Returns `true` for pipe transport.
    #[inline]
    #[must_use]
    pub const fn is_pipe(&self) -> bool {
        matches!(self, Self::Pipe)
    }
}

// ============================================================================
// WindowOptions
// ============================================================================

/// Window process configuration.
///
/// Controls how the browser is launched for one window: the document it
/// opens, its dimensions, and the debugging transport used to reach it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOptions {
    /// Document the window opens, shown app-style without browser UI.
    pub url: String,

    /// Window dimensions in pixels (width, height).
    pub window_size: Option<(u32, u32)>,

    /// Debugging transport.
    pub connect: ConnectMode,

    /// Run without a visible window.
    pub headless: bool,

    /// Script evaluated in the top frame on every navigation.
    pub on_load: Option<String>,

    /// Additional custom command-line arguments.
    pub extra_args: Vec<String>,
}

// ============================================================================
// Constructors
// ============================================================================

impl WindowOptions {
    /// Creates options opening the given URL.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl WindowOptions {
    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = Some((width, height));
        self
    }

    /// Sets the debugging transport.
    #[inline]
    #[must_use]
    pub fn with_connect(mut self, mode: ConnectMode) -> Self {
        self.connect = mode;
        self
    }

    /// Enables headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self) -> Self {
        self.headless = true;
        self
    }

    /// Sets the load hook script.
    #[inline]
    #[must_use]
    pub fn with_on_load(mut self, script: impl Into<String>) -> Self {
        self.on_load = Some(script.into());
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl WindowOptions {
    /// Converts options to browser command-line arguments.
    ///
    /// `port` must be `Some` exactly when the transport is
    /// [`ConnectMode::Port`].
    #[must_use]
    pub fn to_args(&self, profile_dir: &Path, port: Option<u16>) -> Vec<String> {
        let mut args = Vec::with_capacity(8 + self.extra_args.len());

        match (self.connect, port) {
            (ConnectMode::Pipe, _) => args.push("--remote-debugging-pipe".to_string()),
            (ConnectMode::Port, Some(port)) => {
                args.push(format!("--remote-debugging-port={port}"));
            }
            (ConnectMode::Port, None) => args.push("--remote-debugging-port=0".to_string()),
        }

        args.push(format!("--user-data-dir={}", profile_dir.display()));
        args.push("--no-first-run".to_string());
        args.push("--no-default-browser-check".to_string());
        args.push("--disable-extensions".to_string());

        if self.headless {
            args.push("--headless=new".to_string());
        }

        if let Some((width, height)) = self.window_size {
            args.push(format!("--window-size={width},{height}"));
        }

        args.extend(self.extra_args.clone());
        args.push(format!("--app={}", self.url));
        args
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Window URL must not be empty".to_string());
        }
        if let Err(e) = Url::parse(&self.url) {
            return Err(format!("Window URL is not absolute: {e}"));
        }
        if let Some((width, height)) = self.window_size
            && (width == 0 || height == 0)
        {
            return Err("Window dimensions must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Returns `true` if headless mode is enabled.
    #[inline]
    #[must_use]
    pub const fn is_headless(&self) -> bool {
        self.headless
    }
}

// ============================================================================
// Tests
// ============================================================================
