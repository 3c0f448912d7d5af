//! Launcher coordinator and window factory.
//!
//! The [`Launcher`] struct acts as the central coordinator for app
//! windows. It resolves the browser binary once and manages the
//! lifecycle of the windows it opens.
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
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bridge::{
    BindMode, PageIpc, ProcessGuard, RuntimeScript, Session, Window, WindowBuilder,
};
use crate::error::{Error, Result};
use crate::protocol::VersionInfo;
use crate::transport::{CdpClient, RetryPolicy, Transport};

use super::browser;
use super::options::{ConnectMode, WindowOptions};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the launcher.
struct LauncherInner {
    /// Resolved browser binary.
    binary: PathBuf,

    /// Retry schedule for endpoint discovery in socket mode.
    retry: RetryPolicy,

    /// Active windows tracked by their internal UUID.
    windows: Mutex<FxHashMap<Uuid, Window>>,
}

// ============================================================================
// Launcher
// ============================================================================

/// App window coordinator.
///
/// The launcher is responsible for:
/// - Resolving the Chromium binary
/// - Spawning browser processes with isolated profiles
/// - Establishing the DevTools connection and installing the page
///   runtime
/// - Tracking active windows
///
/// # Examples
///
/// ```no_run
/// use chromium_bridge::Launcher;
///
/// # async fn example() -> chromium_bridge::Result<()> {
/// let launcher = Launcher::builder().build()?;
/// let window = launcher.window("https://example.com").open().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Launcher {
    /// Shared inner state.
    inner: Arc<LauncherInner>,
}

// ============================================================================
// Launcher - Display
// ============================================================================

impl fmt::Debug for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launcher")
            .field("binary", &self.inner.binary)
            .field("window_count", &self.window_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Launcher - Public API
// ============================================================================

impl Launcher {
    /// Creates a configuration builder for the launcher.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chromium_bridge::Launcher;
    ///
    /// # fn example() -> chromium_bridge::Result<()> {
    /// let launcher = Launcher::builder()
    ///     .binary("/usr/bin/chromium")
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    #[must_use]
    pub fn builder() -> LauncherBuilder {
        LauncherBuilder::new()
    }

    /// Creates a window builder opening the given URL.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use chromium_bridge::Launcher;
    /// # async fn example(launcher: &Launcher) -> chromium_bridge::Result<()> {
    /// let window = launcher.window("https://example.com")
    ///     .window_size(1920, 1080)
    ///     .open()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    #[must_use]
    pub fn window(&self, url: impl Into<String>) -> WindowBuilder<'_> {
        WindowBuilder::new(self, url)
    }

    /// Returns the resolved browser binary.
    #[inline]
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.inner.binary
    }

    /// Returns the number of active windows currently tracked.
    #[inline]
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.inner.windows.lock().len()
    }

    /// Closes all active windows and shuts down the launcher.
    ///
    /// # Errors
    ///
    /// Never fails currently; individual close failures are logged and
    /// skipped so one stuck window cannot wedge shutdown.
    pub async fn close(&self) -> Result<()> {
        let windows: Vec<Window> = {
            let mut map = self.inner.windows.lock();
            map.drain().map(|(_, w)| w).collect()
        };

        info!(count = windows.len(), "Shutting down all windows");

        for window in windows {
            if let Err(e) = window.close().await {
                debug!(error = %e, "Error closing window during shutdown");
            }
        }

        Ok(())
    }
}

// ============================================================================
// Launcher - Internal API
// ============================================================================

impl Launcher {
    /// Creates a new launcher instance.
    fn new(binary: PathBuf, retry: RetryPolicy) -> Self {
        info!(binary = %binary.display(), "Launcher initialized");
        Self {
            inner: Arc::new(LauncherInner {
                binary,
                retry,
                windows: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Opens a new app window with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The options are invalid
    /// - The browser process fails to spawn
    /// - The transport cannot be established
    /// - The page binding fails validation
    pub(crate) async fn open_window(&self, options: WindowOptions) -> Result<Window> {
        options.validate().map_err(Error::config)?;

        let profile = tempfile::Builder::new()
            .prefix("chromium-bridge-")
            .tempdir()
            .map_err(|e| Error::process_launch(format!("cannot create profile directory: {e}")))?;
        debug!(path = %profile.path().display(), "Created profile directory");

        let (mut guard, transport) = self.spawn(&options, profile.path()).await?;
        let client = CdpClient::connect(transport);

        let parts = prepare_page(&client, &options).await;
        let (session, ipc, versions) = match parts {
            Ok(parts) => parts,
            Err(error) => {
                client.close();
                let _ = guard.kill().await;
                return Err(error);
            }
        };

        let window = Window::new(session, ipc, guard, Some(profile), versions);
        self.inner
            .windows
            .lock()
            .insert(*window.uuid(), window.clone());

        info!(
            uuid = %window.uuid(),
            window_count = self.window_count(),
            "Window opened"
        );
        Ok(window)
    }

    /// Spawns the browser and establishes the matching transport.
    async fn spawn(
        &self,
        options: &WindowOptions,
        profile_dir: &Path,
    ) -> Result<(ProcessGuard, Transport)> {
        match options.connect {
            ConnectMode::Pipe => self.spawn_piped(options, profile_dir),
            ConnectMode::Port => self.spawn_on_port(options, profile_dir).await,
        }
    }

    /// Spawns with `--remote-debugging-pipe`, handing the child a
    /// duplicated fd pair: it reads commands on fd 3 and writes replies
    /// on fd 4.
    #[cfg(unix)]
    fn spawn_piped(
        &self,
        options: &WindowOptions,
        profile_dir: &Path,
    ) -> Result<(ProcessGuard, Transport)> {
        use std::os::fd::{AsRawFd, OwnedFd};

        let (command_read, command_write) = std::io::pipe()?;
        let (reply_read, reply_write) = std::io::pipe()?;

        let mut cmd = Command::new(&self.inner.binary);
        cmd.args(options.to_args(profile_dir, None));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let command_fd = command_read.as_raw_fd();
        let reply_fd = reply_write.as_raw_fd();
        // Safety: only async-signal-safe calls between fork and exec.
        unsafe {
            cmd.pre_exec(move || {
                // dup2 onto a slot the source already occupies would
                // keep CLOEXEC set, so park both sources above the
                // target range first.
                let command_src = libc::fcntl(command_fd, libc::F_DUPFD_CLOEXEC, 5);
                if command_src == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                let reply_src = libc::fcntl(reply_fd, libc::F_DUPFD_CLOEXEC, 5);
                if reply_src == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::dup2(command_src, 3) == -1 || libc::dup2(reply_src, 4) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| Error::process_launch(e.to_string()))?;
        let guard = ProcessGuard::new(child);
        info!(binary = %self.inner.binary.display(), "Browser spawned with pipe transport");

        // The child owns its duplicates now; keep only our ends.
        drop(command_read);
        drop(reply_write);

        let writer = tokio::fs::File::from_std(std::fs::File::from(OwnedFd::from(command_write)));
        let reader = tokio::fs::File::from_std(std::fs::File::from(OwnedFd::from(reply_read)));

        Ok((guard, Transport::pipe(writer, reader)))
    }

    #[cfg(not(unix))]
    fn spawn_piped(
        &self,
        _options: &WindowOptions,
        _profile_dir: &Path,
    ) -> Result<(ProcessGuard, Transport)> {
        Err(Error::config(
            "pipe transport requires a unix host; use ConnectMode::Port",
        ))
    }

    /// Spawns with `--remote-debugging-port` and dials the discovered
    /// page websocket.
    async fn spawn_on_port(
        &self,
        options: &WindowOptions,
        profile_dir: &Path,
    ) -> Result<(ProcessGuard, Transport)> {
        let port = pick_free_port()?;

        let mut cmd = Command::new(&self.inner.binary);
        cmd.args(options.to_args(profile_dir, Some(port)));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd
            .spawn()
            .map_err(|e| Error::process_launch(e.to_string()))?;
        let guard = ProcessGuard::new(child);
        info!(binary = %self.inner.binary.display(), port, "Browser spawned with socket transport");

        // Dropping the guard on a failed dial reaps the process.
        let transport = Transport::socket(port, &self.inner.retry).await?;
        Ok((guard, transport))
    }
}

// ============================================================================
// Window Preparation
// ============================================================================

/// Binds the session, installs the page runtime, and settles the load
/// signal.
async fn prepare_page(
    client: &CdpClient,
    options: &WindowOptions,
) -> Result<(Session, PageIpc, VersionInfo)> {
    let versions: VersionInfo = client.call_as("Browser.getVersion", None, None).await?;
    debug!(
        product = %versions.product,
        protocol = %versions.protocol_version,
        "Browser identified"
    );

    let session = Session::bind(client.clone(), bind_mode_for(options.connect)).await?;
    let ipc = PageIpc::new(session.clone());

    let script = RuntimeScript::new(versions_json(&versions))
        .with_on_load_opt(options.on_load.clone())
        .build();
    session.install_runtime(&script).await?;

    // A document that finished loading before the Page domain came up
    // never emits the load event; ask it directly.
    if !session.is_loaded() {
        let state = session.evaluate("document.readyState").await?;
        if state.as_str() == Some("complete") {
            debug!("Document already complete, forcing load signal");
            session.mark_loaded();
        }
    }

    Ok((session, ipc, versions))
}

/// Maps the transport mode to the session binding mode.
///
/// A pipe connection lands on the browser endpoint and must attach to
/// a target; a socket connection dials the page endpoint directly.
fn bind_mode_for(mode: ConnectMode) -> BindMode {
    match mode {
        ConnectMode::Pipe => BindMode::Attach,
        ConnectMode::Port => BindMode::Direct,
    }
}

/// Version metadata exposed on the page global.
fn versions_json(versions: &VersionInfo) -> Value {
    json!({
        "bridge": env!("CARGO_PKG_VERSION"),
        "product": versions.product,
        "protocol": versions.protocol_version,
        "v8": versions.js_version,
    })
}

/// Reserves an ephemeral loopback port for the debugging endpoint.
fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

// ============================================================================
// LauncherBuilder
// ============================================================================

/// Builder for configuring a [`Launcher`] instance.
///
/// Use [`Launcher::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct LauncherBuilder {
    /// Explicit browser binary, skipping discovery.
    binary: Option<PathBuf>,
    /// Discovery retry schedule override.
    retry: Option<RetryPolicy>,
}

// ============================================================================
// LauncherBuilder Implementation
// ============================================================================

impl LauncherBuilder {
    /// Creates a new launcher builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path to the browser binary executable.
    ///
    /// Without this, the binary is resolved via the
    /// `CHROMIUM_BRIDGE_BROWSER` environment variable, `PATH`, and
    /// well-known install locations.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a Chromium-family binary
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Sets the retry schedule for endpoint discovery in socket mode.
    #[inline]
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds the launcher, resolving the browser binary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserNotFound`] when no usable binary is
    /// found.
    pub fn build(self) -> Result<Launcher> {
        let binary = browser::locate(self.binary.as_deref())?;
        Ok(Launcher::new(binary, self.retry.unwrap_or_default()))
    }
}

// ============================================================================
// Tests
// ============================================================================
