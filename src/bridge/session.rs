//! Target binding and session scope.
//!
//! A [`Session`] pins the client to one browser target:
//!
//! 1. Enumerate targets and attach to the first one (browser-endpoint
//!    connections only; page-endpoint connections are already scoped)
//! 2. Enable the `Runtime` and `Page` domains
//! 3. Register the page-to-host binding
//! 4. Probe the page with `typeof window` and refuse to hand out a
//!    session that cannot evaluate script
//!
//! After binding, the session tracks the page load signal and re-runs
//! the installed runtime script whenever the page gets a fresh
//! execution context, which is what keeps the IPC channel alive across
//! navigations.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    AttachToTargetResult, EvaluateResult, Event, GetTargetsResult, decode,
};
use crate::transport::CdpClient;

use super::inject::BINDING_NAME;

// ============================================================================
// BindMode
// ============================================================================

/// How the connection relates to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// Browser-level endpoint: enumerate targets and attach to one.
    Attach,
    /// Page-level endpoint: already scoped, no attachment needed.
    Direct,
}

// ============================================================================
// Types
// ============================================================================

/// Shared session state.
struct SessionInner {
    /// The underlying protocol client.
    client: CdpClient,
    /// Scope for every session call. `None` means the default session
    /// of a page-level connection.
    session_id: Option<String>,
    /// Target attached to, when attached.
    target_id: Option<String>,
    /// Page load signal. Flips to `true` on the first
    /// `Page.frameStoppedLoading` and never back.
    loaded: Arc<watch::Sender<bool>>,
}

// ============================================================================
// Session
// ============================================================================

/// A client scoped to one attached target.
///
/// Cheap to clone; clones share the binding and the load signal.
#[derive(Clone)]
pub(crate) struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Binds the client to a target and validates the binding.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] when no target exists to attach to
    /// - [`Error::BindingValidation`] when the liveness probe fails;
    ///   the session must not be used after this
    pub(crate) async fn bind(client: CdpClient, mode: BindMode) -> Result<Self> {
        let (session_id, target_id) = match mode {
            BindMode::Attach => {
                let targets: GetTargetsResult =
                    client.call_as("Target.getTargets", None, None).await?;
                let target = targets
                    .target_infos
                    .first()
                    .ok_or_else(|| Error::protocol("no debuggable targets"))?;
                debug!(target_id = %target.target_id, url = %target.url, "attaching to target");

                let attached: AttachToTargetResult = client
                    .call_as(
                        "Target.attachToTarget",
                        Some(json!({"targetId": target.target_id, "flatten": true})),
                        None,
                    )
                    .await?;

                (Some(attached.session_id), Some(target.target_id.clone()))
            }
            BindMode::Direct => (None, None),
        };

        // Runtime first: nothing session-scoped may run before it.
        client
            .call("Runtime.enable", None, session_id.as_deref())
            .await?;
        client
            .call("Page.enable", None, session_id.as_deref())
            .await?;
        client
            .call(
                "Runtime.addBinding",
                Some(json!({"name": BINDING_NAME})),
                session_id.as_deref(),
            )
            .await?;

        let loaded = Arc::new(watch::channel(false).0);
        let session = Self {
            inner: Arc::new(SessionInner {
                client,
                session_id,
                target_id,
                loaded: Arc::clone(&loaded),
            }),
        };

        let scope = session.inner.session_id.clone();
        session.inner.client.on_event(move |event| {
            if event.method == "Page.frameStoppedLoading" && scope_matches(event, scope.as_deref())
            {
                trace!(frame = %event.get_string("frameId"), "page load signal");
                loaded.send_replace(true);
            }
        });

        session.validate_liveness().await?;

        debug!(
            session_id = session.inner.session_id.as_deref().unwrap_or("<default>"),
            "session bound"
        );
        Ok(session)
    }

    /// Probes the page and fails construction when script evaluation is
    /// not working.
    async fn validate_liveness(&self) -> Result<()> {
        let tag = self
            .evaluate("typeof window")
            .await
            .map_err(|e| Error::binding_validation(format!("liveness probe failed: {e}")))?;

        if tag.as_str() != Some("object") {
            return Err(Error::binding_validation(format!(
                "typeof window returned {tag} instead of \"object\""
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Scoped Calls
    // ========================================================================

    /// Sends a command scoped to this session.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.inner
            .client
            .call(method, params, self.inner.session_id.as_deref())
            .await
    }

    /// Evaluates an expression in the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] when the expression throws.
    pub(crate) async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let value = self
            .call("Runtime.evaluate", Some(json!({"expression": expression})))
            .await?;
        decode::<EvaluateResult>(value, "Runtime.evaluate")?.into_value()
    }

    // ========================================================================
    // Runtime Installation
    // ========================================================================

    /// Installs the page runtime script and keeps it installed.
    ///
    /// The script is registered for every future document, evaluated in
    /// the current one, and re-evaluated once per new execution
    /// context. The script's own guard makes overlap harmless.
    pub(crate) async fn install_runtime(&self, source: &str) -> Result<()> {
        self.call(
            "Page.addScriptToEvaluateOnNewDocument",
            Some(json!({"source": source})),
        )
        .await?;
        self.evaluate(source).await?;

        let client = self.inner.client.clone();
        let scope = self.inner.session_id.clone();
        let source = source.to_string();
        self.inner.client.on_event(move |event| {
            if event.method != "Runtime.executionContextCreated"
                || !scope_matches(event, scope.as_deref())
            {
                return;
            }
            trace!("execution context created, re-injecting runtime");
            let client = client.clone();
            let scope = scope.clone();
            let source = source.clone();
            tokio::spawn(async move {
                if let Err(error) = client
                    .call(
                        "Runtime.evaluate",
                        Some(json!({"expression": source})),
                        scope.as_deref(),
                    )
                    .await
                {
                    warn!(%error, "runtime re-injection failed");
                }
            });
        });

        Ok(())
    }

    // ========================================================================
    // Load Signal
    // ========================================================================

    /// Waits until the page has finished its first load.
    ///
    /// Returns immediately once the signal has fired; the signal never
    /// resets.
    pub(crate) async fn wait_until_loaded(&self) -> Result<()> {
        let mut rx = self.inner.loaded.subscribe();
        rx.wait_for(|loaded| *loaded)
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(())
    }

    /// Returns `true` once the load signal has fired.
    #[inline]
    #[must_use]
    pub(crate) fn is_loaded(&self) -> bool {
        *self.inner.loaded.borrow()
    }

    /// Force-sets the load signal.
    ///
    /// Used when the page was already complete before the `Page` domain
    /// was enabled, in which case no load event will ever arrive.
    pub(crate) fn mark_loaded(&self) {
        self.inner.loaded.send_replace(true);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The session scope, when attached.
    #[inline]
    #[must_use]
    pub(crate) fn session_id(&self) -> Option<&str> {
        self.inner.session_id.as_deref()
    }

    /// The attached target, when attached.
    #[inline]
    #[must_use]
    pub(crate) fn target_id(&self) -> Option<&str> {
        self.inner.target_id.as_deref()
    }

    /// The underlying protocol client.
    #[inline]
    pub(crate) fn client(&self) -> &CdpClient {
        &self.inner.client
    }

    /// Returns `true` when an event belongs to this session.
    #[inline]
    #[must_use]
    pub(crate) fn accepts_event(&self, event: &Event) -> bool {
        scope_matches(event, self.inner.session_id.as_deref())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("target_id", &self.inner.target_id)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Matches an event against a session scope.
///
/// An unscoped session accepts everything; an attached one accepts only
/// events stamped with its id.
fn scope_matches(event: &Event, session_id: Option<&str>) -> bool {
    match session_id {
        Some(id) => event.session_id.as_deref() == Some(id),
        None => true,
    }
}

// ============================================================================
// Tests
// ============================================================================
