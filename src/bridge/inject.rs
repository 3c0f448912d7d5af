//! Injected page runtime.
//!
//! This module generates the JavaScript that installs the page half of
//! the IPC channel. The generated script is evaluated once in the
//! current document and registered to auto-run on every new document,
//! so the page object survives navigations.
//!
//! # Installed Global
//!
//! ```ignore
//! globalThis.chromiumBridge = {
//!     versions,                      // static host/browser metadata
//!     ipc: { send, on, removeListener },
//!     _receive,                      // host delivery entry point
//! }
//! ```
//!
//! # Delivery Paths
//!
//! 1. Page to host: the script captures the CDP binding installed by
//!    `Runtime.addBinding` into a closure and deletes it from the
//!    global scope, so page code cannot write raw frames directly.
//! 2. Host to page: the host evaluates a call to `_receive` with the
//!    serialized message embedded as a string literal.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Name of the page global installed by the runtime script.
pub const GLOBAL_NAME: &str = "chromiumBridge";

/// Name of the CDP binding captured by the runtime script.
///
/// Registered via `Runtime.addBinding`; exists in the global scope only
/// for the instant between context creation and script startup.
pub const BINDING_NAME: &str = "__chromiumBridgeSend";

/// Installer template.
///
/// `$GLOBAL`, `$BINDING` and `$VERSIONS` are substituted by
/// [`RuntimeScript::build`]; `$ON_LOAD_BLOCK` expands to the wrapped
/// load hook or to nothing.
const RUNTIME_TEMPLATE: &str = r#"(() => {
  'use strict';
  if (globalThis['$GLOBAL'] && globalThis['$GLOBAL'].ipc) { return; }
  const rawSend = globalThis['$BINDING'];
  delete globalThis['$BINDING'];
  const pending = new Map();
  const listeners = new Map();
  const post = (message) => {
    if (typeof rawSend === 'function') { rawSend(JSON.stringify(message)); }
  };
  const nextId = () =>
    (globalThis.crypto && typeof globalThis.crypto.randomUUID === 'function')
      ? globalThis.crypto.randomUUID()
      : Math.random().toString(36).slice(2) + Date.now().toString(36);
  const receive = async (message) => {
    if (!message || typeof message.id !== 'string') { return; }
    if (message.isReply) {
      const resolve = pending.get(message.id);
      if (resolve) { pending.delete(message.id); resolve(message.data); }
      return;
    }
    const handlers = listeners.get(message.type) || [];
    let reply;
    for (const handler of handlers) {
      let value;
      try { value = await handler(message.data); }
      catch (err) { console.error('[$GLOBAL] listener for "' + message.type + '" failed:', err); }
      if (!reply) { reply = value; }
    }
    if (reply) { post({ id: message.id, type: message.type, data: reply, isReply: true }); }
    else { post({ id: message.id, type: 'pong', data: null, isReply: true }); }
  };
  const ipc = {
    send(type, data, id) {
      if (id !== undefined) {
        post({ id: id, type: type, data: data, isReply: true });
        return Promise.resolve(null);
      }
      const messageId = nextId();
      const settled = new Promise((resolve) => { pending.set(messageId, resolve); });
      post({ id: messageId, type: type, data: data, isReply: false });
      return settled;
    },
    on(type, callback) {
      const handlers = listeners.get(type) || [];
      handlers.push(callback);
      listeners.set(type, handlers);
    },
    removeListener(type, callback) {
      const handlers = listeners.get(type) || [];
      listeners.set(type, handlers.filter((entry) => entry !== callback));
    },
  };
  globalThis['$GLOBAL'] = Object.freeze({
    versions: $VERSIONS,
    ipc: ipc,
    _receive: receive,
  });
$ON_LOAD_BLOCK})();"#;

/// Load-hook template, expanded only when a hook is configured.
///
/// The hook runs in the top-level frame only, once per document the
/// installer runs for.
const ON_LOAD_TEMPLATE: &str = r#"  if (window.self === window.top) {
    try { $USER_SCRIPT }
    catch (err) { console.error('[$GLOBAL] load hook failed:', err); }
  }
"#;

// ============================================================================
// RuntimeScript
// ============================================================================

/// Builder for the injected page runtime source.
#[derive(Debug, Clone)]
pub struct RuntimeScript {
    /// Metadata exposed as the page global's `versions` field.
    versions: Value,
    /// Optional caller-supplied script run after installation.
    on_load: Option<String>,
}

impl RuntimeScript {
    /// Creates a runtime script exposing the given version metadata.
    #[must_use]
    pub fn new(versions: Value) -> Self {
        Self {
            versions,
            on_load: None,
        }
    }

    /// Sets the load hook script.
    #[must_use]
    pub fn with_on_load(mut self, script: impl Into<String>) -> Self {
        self.on_load = Some(script.into());
        self
    }

    /// Sets or clears the load hook script.
    #[must_use]
    pub fn with_on_load_opt(mut self, script: Option<String>) -> Self {
        self.on_load = script;
        self
    }

    /// Renders the installer source.
    ///
    /// Safe to evaluate repeatedly in one execution context: the
    /// installed global doubles as the guard, so reruns return before
    /// touching any state.
    #[must_use]
    pub fn build(&self) -> String {
        let on_load_block = match &self.on_load {
            // The user script substitutes last so its content is never
            // scanned for template tokens.
            Some(script) => ON_LOAD_TEMPLATE
                .replace("$GLOBAL", GLOBAL_NAME)
                .replace("$USER_SCRIPT", script),
            None => String::new(),
        };

        RUNTIME_TEMPLATE
            .replace("$GLOBAL", GLOBAL_NAME)
            .replace("$BINDING", BINDING_NAME)
            .replace("$VERSIONS", &self.versions.to_string())
            .replace("$ON_LOAD_BLOCK", &on_load_block)
    }
}

// ============================================================================
// Delivery Expression
// ============================================================================

/// Builds the evaluate expression delivering one serialized message to
/// the page.
///
/// The message JSON travels as a string literal and is parsed inside
/// the page, which sidesteps every JSON-in-JS embedding pitfall.
#[must_use]
pub(crate) fn receive_expression(message_json: &str) -> String {
    let literal = js_string(message_json);
    format!("void globalThis['{GLOBAL_NAME}']._receive(JSON.parse({literal}));")
}

/// Escapes a string into a JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

// ============================================================================
// Tests
// ============================================================================
