//! Browser window management and control.
//!
//! Each [`Window`] owns:
//! - One Chromium process (child process)
//! - One DevTools connection (pipe or websocket)
//! - One temporary profile directory
//!
//! # Example
//!
//! ```no_run
//! use chromium_bridge::Launcher;
//!
//! # async fn example() -> chromium_bridge::Result<()> {
//! let launcher = Launcher::builder().build()?;
//!
//! let window = launcher.window("https://example.com")
//!     .window_size(1280, 800)
//!     .open()
//!     .await?;
//!
//! let title = window.title().await?;
//! println!("opened: {title}");
//!
//! window.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::launcher::{ConnectMode, Launcher, WindowOptions};
use crate::protocol::{EvaluateResult, VersionInfo, decode};
use crate::transport::CdpClient;

use super::ipc::PageIpc;
use super::session::Session;

// ============================================================================
// ProcessGuard
// ============================================================================

/// Guards a child process and ensures it is killed when dropped.
pub(crate) struct ProcessGuard {
    /// The child process handle.
    child: Option<Child>,
    /// Process ID for logging.
    pid: u32,
}

impl ProcessGuard {
    /// Creates a new process guard.
    pub(crate) fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Process guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Kills the process and waits for it to exit.
    pub(crate) async fn kill(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            debug!(pid = self.pid, "Killing browser process");
            if let Err(e) = child.kill().await {
                debug!(pid = self.pid, error = %e, "Failed to kill process");
            }
            if let Err(e) = child.wait().await {
                debug!(pid = self.pid, error = %e, "Failed to wait for process");
            }
            info!(pid = self.pid, "Process terminated");
        }
        Ok(())
    }

    /// Returns the process ID.
    #[inline]
    fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a window.
struct WindowInner {
    /// Unique identifier for this window.
    uuid: Uuid,
    /// Bound session carrying the DevTools connection.
    session: Session,
    /// Message channel to the page runtime.
    ipc: PageIpc,
    /// Browser build information captured at startup.
    versions: VersionInfo,
    /// Protected process handle.
    process: Mutex<ProcessGuard>,
    /// Profile directory, removed when the window is dropped.
    #[allow(dead_code)]
    profile: Option<TempDir>,
}

// ============================================================================
// Window
// ============================================================================

/// A handle to a Chromium app window.
///
/// The window owns a browser process, a DevTools connection, and a
/// temporary profile. When dropped, the process is automatically
/// killed.
///
/// # Example
///
/// ```no_run
/// # use chromium_bridge::Launcher;
/// # async fn example() -> chromium_bridge::Result<()> {
/// # let launcher = Launcher::builder().build()?;
/// let window = launcher.window("https://example.com").open().await?;
///
/// // Talk to page script over IPC
/// let pong = window.ipc().request("ping", serde_json::json!({})).await?;
///
/// // Or evaluate directly
/// let sum = window.eval("1 + 2").await?;
///
/// window.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Window {
    /// Shared inner state.
    inner: Arc<WindowInner>,
}

// ============================================================================
// Window - Display
// ============================================================================

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("uuid", &self.inner.uuid)
            .field("session_id", &self.inner.session.session_id())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Window - Constructor
// ============================================================================

impl Window {
    /// Creates a new window handle, adopting an already guarded
    /// process.
    pub(crate) fn new(
        session: Session,
        ipc: PageIpc,
        process: ProcessGuard,
        profile: Option<TempDir>,
        versions: VersionInfo,
    ) -> Self {
        let uuid = Uuid::new_v4();
        debug!(
            uuid = %uuid,
            session_id = session.session_id().unwrap_or("<default>"),
            product = %versions.product,
            "Window created"
        );

        Self {
            inner: Arc::new(WindowInner {
                uuid,
                session,
                ipc,
                versions,
                process: Mutex::new(process),
                profile,
            }),
        }
    }
}

// ============================================================================
// Window - Accessors
// ============================================================================

impl Window {
    /// Returns the Rust-side unique UUID.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &Uuid {
        &self.inner.uuid
    }

    /// Returns the DevTools session id, when attached.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.inner.session.session_id()
    }

    /// Returns browser build information.
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &VersionInfo {
        &self.inner.versions
    }

    /// Returns the browser process ID.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.inner.process.lock().pid()
    }

    /// Returns the message channel to the page runtime.
    #[inline]
    #[must_use]
    pub fn ipc(&self) -> &PageIpc {
        &self.inner.ipc
    }

    /// Returns the raw protocol client.
    ///
    /// Escape hatch for DevTools methods the window does not wrap.
    /// Session-scoped methods must be stamped with
    /// [`session_id`](Self::session_id).
    #[inline]
    #[must_use]
    pub fn cdp(&self) -> &CdpClient {
        self.inner.session.client()
    }
}

// ============================================================================
// Window - Page Operations
// ============================================================================

impl Window {
    /// Evaluates a JavaScript expression in the page.
    ///
    /// The expression result is marshalled by value and promises are
    /// awaited, so `fetch(...).then(r => r.json())` returns the JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] when the expression throws.
    pub async fn eval(&self, expression: &str) -> Result<Value> {
        let value = self
            .inner
            .session
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;
        decode::<EvaluateResult>(value, "Runtime.evaluate")?.into_value()
    }

    /// Returns the current document title.
    pub async fn title(&self) -> Result<String> {
        let value = self.eval("document.title").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("document.title did not return a string"))
    }

    /// Returns the current document URL.
    pub async fn url(&self) -> Result<String> {
        let value = self.eval("window.location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("window.location.href did not return a string"))
    }

    /// Navigates the window to a new URL.
    ///
    /// Returns as soon as the browser accepts the navigation; the
    /// installed runtime script is re-injected into the new document
    /// automatically.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!(uuid = %self.inner.uuid, url, "Navigating window");
        self.inner
            .session
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;
        Ok(())
    }

    /// Reloads the current document.
    pub async fn reload(&self) -> Result<()> {
        debug!(uuid = %self.inner.uuid, "Reloading window");
        self.inner.session.call("Page.reload", None).await?;
        Ok(())
    }

    /// Captures a PNG screenshot of the window.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self
            .inner
            .session
            .call("Page.captureScreenshot", Some(json!({"format": "png"})))
            .await?;
        decode_blob(&value, "Page.captureScreenshot")
    }

    /// Prints the current document to PDF.
    pub async fn print_to_pdf(&self) -> Result<Vec<u8>> {
        let value = self.inner.session.call("Page.printToPDF", None).await?;
        decode_blob(&value, "Page.printToPDF")
    }
}

// ============================================================================
// Window - Lifecycle
// ============================================================================

impl Window {
    /// Closes the window and kills the browser process.
    ///
    /// Asks the browser to shut down first, then closes the connection
    /// and kills whatever is left of the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be killed.
    #[allow(clippy::await_holding_lock)]
    pub async fn close(&self) -> Result<()> {
        debug!(uuid = %self.inner.uuid, "Closing window");

        let graceful = timeout(
            Duration::from_secs(2),
            self.inner.session.client().call("Browser.close", None, None),
        )
        .await;
        if !matches!(graceful, Ok(Ok(_))) {
            debug!(uuid = %self.inner.uuid, "Browser did not close gracefully");
        }

        self.inner.session.client().close();
        let mut guard = self.inner.process.lock();
        guard.kill().await?;
        info!(uuid = %self.inner.uuid, "Window closed");
        Ok(())
    }
}

// ============================================================================
// WindowBuilder
// ============================================================================

/// Builder for opening app windows.
///
/// # Example
///
/// ```no_run
/// # use chromium_bridge::Launcher;
/// # async fn example() -> chromium_bridge::Result<()> {
/// # let launcher = Launcher::builder().build()?;
/// let window = launcher.window("https://example.com")
///     .window_size(1920, 1080)
///     .headless()
///     .on_load("document.body.dataset.bridge = 'ready';")
///     .open()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct WindowBuilder<'a> {
    /// Reference to the launcher.
    launcher: &'a Launcher,
    /// Window launch options.
    options: WindowOptions,
}

// ============================================================================
// WindowBuilder - Implementation
// ============================================================================

impl<'a> WindowBuilder<'a> {
    /// Creates a new window builder.
    pub(crate) fn new(launcher: &'a Launcher, url: impl Into<String>) -> Self {
        Self {
            launcher,
            options: WindowOptions::new(url),
        }
    }

    /// Sets the window size.
    ///
    /// # Arguments
    ///
    /// * `width` - Window width in pixels
    /// * `height` - Window height in pixels
    #[must_use]
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.options = self.options.with_window_size(width, height);
        self
    }

    /// Selects the debugging transport.
    ///
    /// Defaults to [`ConnectMode::Pipe`].
    #[must_use]
    pub fn connect(mut self, mode: ConnectMode) -> Self {
        self.options = self.options.with_connect(mode);
        self
    }

    /// Enables headless mode.
    ///
    /// The browser runs without a visible window.
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.options = self.options.with_headless();
        self
    }

    /// Sets a script evaluated in the top frame on every page load.
    #[must_use]
    pub fn on_load(mut self, script: impl Into<String>) -> Self {
        self.options = self.options.with_on_load(script);
        self
    }

    /// Adds a custom browser command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.options = self.options.with_arg(arg);
        self
    }

    /// Opens the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or the
    /// connection cannot be established.
    pub async fn open(self) -> Result<Window> {
        self.launcher.open_window(self.options).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Pulls the base64 `data` field out of a capture reply.
fn decode_blob(value: &Value, what: &str) -> Result<Vec<u8>> {
    let data = value
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol(format!("{what} reply carried no data")))?;
    Base64Standard
        .decode(data)
        .map_err(|e| Error::protocol(format!("{what} data is not valid base64: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
