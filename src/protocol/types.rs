//! Typed CDP result structures.
//!
//! Command replies arrive as loose JSON; the structs here give the
//! handful of methods the crate consumes a checked shape. A missing or
//! misshapen field surfaces as
//! [`Error::Protocol`](crate::Error::Protocol), never a panic.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a reply payload into a typed structure.
///
/// # Errors
///
/// Returns [`Error::Protocol`] naming `what` when the payload does not
/// match the expected shape.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::protocol(format!("unexpected {what} reply shape: {e}")))
}

// ============================================================================
// Target Types
// ============================================================================

/// One entry of `Target.getTargets`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    /// Target identifier used for attach.
    #[serde(rename = "targetId")]
    pub target_id: String,

    /// Target kind: `page`, `iframe`, `background_page`, ...
    #[serde(rename = "type", default)]
    pub target_type: String,

    /// Page title at snapshot time.
    #[serde(default)]
    pub title: String,

    /// Page URL at snapshot time.
    #[serde(default)]
    pub url: String,

    /// Whether a debugger is already attached.
    #[serde(default)]
    pub attached: bool,
}

impl TargetInfo {
    /// Returns `true` for ordinary page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// Reply of `Target.getTargets`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTargetsResult {
    /// Known targets in browser order.
    #[serde(rename = "targetInfos", default)]
    pub target_infos: Vec<TargetInfo>,
}

/// Reply of `Target.attachToTarget`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResult {
    /// Session id stamped onto all further session-scoped commands.
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

// ============================================================================
// Runtime Types
// ============================================================================

/// Mirror of a value living in the page, as returned by evaluate.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteObject {
    /// JS type tag: `string`, `number`, `object`, `undefined`, ...
    #[serde(rename = "type", default)]
    pub object_type: String,

    /// The value itself when returned by value.
    #[serde(default)]
    pub value: Option<Value>,

    /// Printable description for non-serializable values.
    #[serde(default)]
    pub description: Option<String>,
}

/// Exception information attached to a failed evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct ExceptionDetails {
    /// Summary line, usually `Uncaught`.
    #[serde(default)]
    pub text: String,

    /// Zero-based line of the throw site.
    #[serde(rename = "lineNumber", default)]
    pub line_number: u32,

    /// Zero-based column of the throw site.
    #[serde(rename = "columnNumber", default)]
    pub column_number: u32,

    /// The thrown value.
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Renders the most specific message available.
    #[must_use]
    pub fn message(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Reply of `Runtime.evaluate`.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResult {
    /// Evaluation result.
    pub result: RemoteObject,

    /// Present when the expression threw.
    #[serde(rename = "exceptionDetails", default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl EvaluateResult {
    /// Extracts the returned value, converting a page-side throw.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] when the page threw.
    pub fn into_value(self) -> Result<Value> {
        if let Some(details) = self.exception_details {
            return Err(Error::script_error(details.message()));
        }
        Ok(self.result.value.unwrap_or(Value::Null))
    }
}

// ============================================================================
// Browser Types
// ============================================================================

/// Reply of `Browser.getVersion`, captured once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    /// DevTools protocol version.
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: String,

    /// Product name and version, e.g. `Chrome/126.0.6478.55`.
    #[serde(default)]
    pub product: String,

    /// Build revision.
    #[serde(default)]
    pub revision: String,

    /// Full user agent string.
    #[serde(rename = "userAgent", default)]
    pub user_agent: String,

    /// V8 version.
    #[serde(rename = "jsVersion", default)]
    pub js_version: String,
}

// ============================================================================
// Discovery Types
// ============================================================================

/// One row of the `/json/list` discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugTarget {
    /// Target identifier.
    #[serde(default)]
    pub id: String,

    /// Target kind.
    #[serde(rename = "type", default)]
    pub target_type: String,

    /// Page title.
    #[serde(default)]
    pub title: String,

    /// Page URL.
    #[serde(default)]
    pub url: String,

    /// Per-target websocket endpoint; absent when another client is
    /// already attached.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
