//! Browser binary discovery.
//!
//! Resolution order:
//!
//! 1. Explicit path handed to the launcher builder
//! 2. The `CHROMIUM_BRIDGE_BROWSER` environment variable
//! 3. Well-known binary names on `PATH`
//! 4. Per-platform install locations
//!
//! An explicit path or environment override that does not exist is an
//! error rather than a fallthrough, so a typo never silently launches
//! a different browser.

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding browser discovery.
pub(crate) const ENV_BROWSER: &str = "CHROMIUM_BRIDGE_BROWSER";

/// Binary names probed on `PATH`, most specific first.
const PATH_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
    "google-chrome",
    "chrome",
    "brave-browser",
    "microsoft-edge",
];

/// Install locations probed after `PATH`.
#[cfg(target_os = "linux")]
const KNOWN_LOCATIONS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/snap/bin/chromium",
    "/usr/bin/brave-browser",
    "/usr/bin/microsoft-edge",
];

#[cfg(target_os = "macos")]
const KNOWN_LOCATIONS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const KNOWN_LOCATIONS: &[&str] = &[];

// ============================================================================
// Discovery
// ============================================================================

/// Resolves the browser binary to launch.
///
/// # Errors
///
/// Returns [`Error::BrowserNotFound`] when nothing usable is found, or
/// when an explicit path or environment override points nowhere.
pub(crate) fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::browser_not_found(format!(
            "configured binary {} does not exist",
            path.display()
        )));
    }

    if let Ok(value) = env::var(ENV_BROWSER)
        && !value.is_empty()
    {
        let path = PathBuf::from(&value);
        if path.exists() {
            debug!(path = %path.display(), "Browser resolved from environment");
            return Ok(path);
        }
        return Err(Error::browser_not_found(format!(
            "{ENV_BROWSER} points at {value}, which does not exist"
        )));
    }

    for name in PATH_CANDIDATES {
        if let Ok(path) = which::which(name) {
            debug!(path = %path.display(), "Browser resolved from PATH");
            return Ok(path);
        }
    }

    for location in KNOWN_LOCATIONS {
        let path = Path::new(location);
        if path.exists() {
            debug!(path = %path.display(), "Browser resolved from known location");
            return Ok(path.to_path_buf());
        }
    }

    Err(Error::browser_not_found(format!(
        "no Chromium-family binary found; searched {ENV_BROWSER}, PATH ({}) and known install locations",
        PATH_CANDIDATES.join(", ")
    )))
}

// ============================================================================
// Tests
// ============================================================================
