//! Host side of the page IPC channel.
//!
//! Mirrors the protocol the injected runtime speaks:
//!
//! - Outbound requests carry a random string id and resolve when the
//!   page replies with the same id
//! - Inbound page requests fan out to every listener registered for
//!   their type; the first listener returning a truthy value supplies
//!   the reply, and a request nobody answers is acknowledged with
//!   `pong` so the page never awaits forever
//! - Replies whose id matches nothing are dropped silently
//!
//! Outbound delivery waits for the page's first load signal, so a
//! message can never race the runtime installation in a document that
//! is still parsing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::inject::{self, BINDING_NAME};
use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Handle for removing an IPC listener.
pub type ListenerId = u64;

/// One IPC frame crossing the host/page boundary, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IpcMessage {
    /// Correlation token. Random per request, echoed on the reply.
    pub(crate) id: String,

    /// Application channel name, or `pong` for a bare acknowledgement.
    #[serde(rename = "type")]
    pub(crate) kind: String,

    /// Application payload.
    #[serde(default)]
    pub(crate) data: Value,

    /// Set on replies; a reply is never replied to.
    #[serde(rename = "isReply", default)]
    pub(crate) is_reply: bool,
}

/// One entry of the per-type listener list.
struct ListenerEntry {
    id: ListenerId,
    handler: Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>,
}

/// Shared IPC state.
struct IpcInner {
    /// Session used to evaluate delivery expressions in the page.
    session: Session,
    /// Outbound requests waiting for a page reply.
    pending: Mutex<FxHashMap<String, oneshot::Sender<Value>>>,
    /// Listener lists keyed by message type, in registration order.
    listeners: Mutex<FxHashMap<String, Vec<ListenerEntry>>>,
    /// Next listener id.
    next_listener_id: AtomicU64,
}

// ============================================================================
// PageIpc
// ============================================================================

/// Typed message channel between host code and page script.
///
/// Cheap to clone; clones share the pending table and listener
/// registry.
#[derive(Clone)]
pub struct PageIpc {
    inner: Arc<IpcInner>,
}

impl PageIpc {
    /// Creates the host endpoint and hooks it into the session's
    /// binding events.
    pub(crate) fn new(session: Session) -> Self {
        let ipc = Self {
            inner: Arc::new(IpcInner {
                session: session.clone(),
                pending: Mutex::new(FxHashMap::default()),
                listeners: Mutex::new(FxHashMap::default()),
                next_listener_id: AtomicU64::new(0),
            }),
        };

        // The client outlives individual windows; a weak reference
        // keeps a dropped endpoint collectible.
        let weak = Arc::downgrade(&ipc.inner);
        session.client().on_event(move |event| {
            if event.method != "Runtime.bindingCalled" {
                return;
            }
            let Some(inner) = weak.upgrade() else { return };
            if !inner.session.accepts_event(event) {
                return;
            }
            if event.get_string("name") != BINDING_NAME {
                return;
            }
            IpcInner::handle_binding_payload(&inner, event.get_string("payload"));
        });

        ipc
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Sends a request to the page and waits for its reply.
    ///
    /// Waits for the page load signal first, then indefinitely for the
    /// reply; use [`request_with_timeout`](Self::request_with_timeout)
    /// for a deadline. A page with no listener for `kind` still
    /// acknowledges, so the wait ends either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] when the delivery expression
    /// throws in the page (the runtime global is missing there).
    pub async fn request(&self, kind: &str, data: Value) -> Result<Value> {
        let (id, reply_rx) = self.begin_request(kind, data).await?;
        trace!(%id, kind, "ipc request sent");
        reply_rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a request and waits for the reply with a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTimeout`] when no reply arrives in time;
    /// the pending entry is removed so a late reply is dropped.
    pub async fn request_with_timeout(
        &self,
        kind: &str,
        data: Value,
        deadline: Duration,
    ) -> Result<Value> {
        let (id, reply_rx) = self.begin_request(kind, data).await?;

        match timeout(deadline, reply_rx).await {
            Ok(received) => received.map_err(|_| Error::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(Error::request_timeout(kind, deadline.as_millis() as u64))
            }
        }
    }

    /// Sends a one-way notification.
    ///
    /// Delivery is confirmed at the transport level only; the page's
    /// acknowledgement is dropped on arrival.
    pub async fn notify(&self, kind: &str, data: Value) -> Result<()> {
        self.inner.session.wait_until_loaded().await?;

        let message = IpcMessage {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            data,
            is_reply: false,
        };
        trace!(id = %message.id, kind, "ipc notification sent");
        self.inner.deliver(&message).await
    }

    /// Registers the pending entry and delivers the request frame.
    async fn begin_request(
        &self,
        kind: &str,
        data: Value,
    ) -> Result<(String, oneshot::Receiver<Value>)> {
        self.inner.session.wait_until_loaded().await?;

        let id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), reply_tx);

        let message = IpcMessage {
            id: id.clone(),
            kind: kind.to_string(),
            data,
            is_reply: false,
        };

        if let Err(error) = self.inner.deliver(&message).await {
            self.inner.pending.lock().remove(&id);
            return Err(error);
        }
        Ok((id, reply_rx))
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Registers a listener for a message type.
    ///
    /// Listeners run in registration order. Returning `Some` of a
    /// truthy value answers the request; returning `None` or a falsy
    /// value passes.
    pub fn on(
        &self,
        kind: &str,
        handler: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .entry(kind.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let Some(entries) = listeners.get_mut(kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Number of listeners registered for a type.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Number of requests waiting for a page reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl fmt::Debug for PageIpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageIpc")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// IpcInner
// ============================================================================

impl IpcInner {
    /// Routes one payload pushed by the page through the binding.
    fn handle_binding_payload(shared: &Arc<IpcInner>, payload: &str) {
        let message: IpcMessage = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, bytes = payload.len(), "malformed ipc payload");
                return;
            }
        };

        if message.is_reply {
            let tx = shared.pending.lock().remove(&message.id);
            match tx {
                Some(tx) => {
                    let _ = tx.send(message.data);
                }
                // Late reply or a stray acknowledgement.
                None => debug!(id = %message.id, "ipc reply for unknown request"),
            }
            return;
        }

        trace!(id = %message.id, kind = %message.kind, "ipc request from page");
        let reply = shared.collect_reply(&message.kind, &message.data);
        let response = match reply {
            Some(data) => IpcMessage {
                id: message.id,
                kind: message.kind,
                data,
                is_reply: true,
            },
            None => IpcMessage {
                id: message.id,
                kind: "pong".to_string(),
                data: Value::Null,
                is_reply: true,
            },
        };

        // Delivery needs the async session; this runs on the dispatch
        // task, so hand it off.
        let inner = Arc::clone(shared);
        tokio::spawn(async move {
            if let Err(error) = inner.deliver(&response).await {
                warn!(%error, id = %response.id, "failed to deliver ipc reply");
            }
        });
    }

    /// Runs every listener for a type and picks the winning reply.
    ///
    /// All listeners are invoked; the first truthy return value sticks.
    /// A panicking listener is logged and treated as having passed.
    fn collect_reply(&self, kind: &str, data: &Value) -> Option<Value> {
        let handlers: Vec<_> = self
            .listeners
            .lock()
            .get(kind)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
            .unwrap_or_default();

        let mut reply: Option<Value> = None;
        for handler in handlers {
            let value = match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(value) => value,
                Err(_) => {
                    warn!(kind, "ipc listener panicked");
                    None
                }
            };
            if !reply.as_ref().is_some_and(is_truthy)
                && let Some(value) = value
            {
                reply = Some(value);
            }
        }

        reply.filter(is_truthy)
    }

    /// Evaluates the delivery expression for one message in the page.
    async fn deliver(&self, message: &IpcMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        let expression = inject::receive_expression(&payload);
        self.session.evaluate(&expression).await?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// JavaScript truthiness over JSON values.
///
/// `null`, `false`, `0` and the empty string are falsy; arrays and
/// objects are always truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::session::BindMode;
    use crate::transport::pipe::{PipeReader, PipeWriter};
    use crate::transport::{CdpClient, Transport};
    use serde_json::json;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type PeerReader = PipeReader<ReadHalf<DuplexStream>>;
    type PeerWriter = PipeWriter<WriteHalf<DuplexStream>>;

    fn pipe_client() -> (CdpClient, PeerReader, PeerWriter) {
        let (host_side, peer_side) = tokio::io::duplex(64 * 1024);
        let (host_read, host_write) = tokio::io::split(host_side);
        let (peer_read, peer_write) = tokio::io::split(peer_side);

        let client = CdpClient::connect(Transport::pipe(host_write, host_read));
        (client, PipeReader::new(peer_read), PipeWriter::new(peer_write))
    }

    async fn expect_call(
        rx: &mut PeerReader,
        tx: &mut PeerWriter,
        method: &str,
        result: Value,
    ) -> Value {
        let frame = rx.next_frame().await.expect("command frame");
        let sent: Value = serde_json::from_str(&frame).expect("valid envelope");
        assert_eq!(sent["method"], json!(method), "unexpected command order");

        let reply = json!({"id": sent["id"], "result": result});
        tx.send_frame(&serde_json::to_string(&reply).expect("serialize"))
            .await
            .expect("reply");
        sent
    }

    fn undefined_result() -> Value {
        json!({"result": {"type": "undefined"}})
    }

    /// Builds a bound session plus its IPC endpoint over an in-memory
    /// peer.
    async fn fixture() -> (PageIpc, Session, PeerReader, PeerWriter) {
        let (client, mut rx, mut tx) = pipe_client();

        let bind = tokio::spawn(Session::bind(client.clone(), BindMode::Direct));
        expect_call(&mut rx, &mut tx, "Runtime.enable", json!({})).await;
        expect_call(&mut rx, &mut tx, "Page.enable", json!({})).await;
        expect_call(&mut rx, &mut tx, "Runtime.addBinding", json!({})).await;
        expect_call(
            &mut rx,
            &mut tx,
            "Runtime.evaluate",
            json!({"result": {"type": "string", "value": "object"}}),
        )
        .await;
        let session = bind.await.expect("join").expect("bind");

        let ipc = PageIpc::new(session.clone());
        (ipc, session, rx, tx)
    }

    /// Simulates the page pushing one IPC message through the binding.
    async fn emit_binding(tx: &mut PeerWriter, message: Value) {
        let payload = serde_json::to_string(&message).expect("serialize");
        let event = json!({
            "method": "Runtime.bindingCalled",
            "params": {"name": BINDING_NAME, "payload": payload, "executionContextId": 1}
        });
        tx.send_frame(&serde_json::to_string(&event).expect("serialize"))
            .await
            .expect("event");
    }

    /// Pulls the IPC message back out of a delivery expression.
    fn extract_ipc_payload(expression: &str) -> IpcMessage {
        let start = expression.find("JSON.parse(").expect("parse call") + "JSON.parse(".len();
        let end = expression.rfind("))").expect("closing parens");
        let payload: String = serde_json::from_str(&expression[start..end]).expect("literal");
        serde_json::from_str(&payload).expect("ipc message")
    }

    #[tokio::test]
    async fn test_request_resolves_with_page_reply() {
        let (ipc, session, mut rx, mut tx) = fixture().await;
        session.mark_loaded();

        let request = tokio::spawn({
            let ipc = ipc.clone();
            async move { ipc.request("greet", json!({"who": "rust"})).await }
        });

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let message = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(message.kind, "greet");
        assert!(!message.is_reply);
        assert_eq!(message.data, json!({"who": "rust"}));
        assert!(!message.id.is_empty());

        emit_binding(
            &mut tx,
            json!({"id": message.id, "type": "greet", "data": "hello", "isReply": true}),
        )
        .await;

        assert_eq!(request.await.expect("join").expect("reply"), json!("hello"));
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_waits_for_load_signal() {
        let (ipc, session, mut rx, mut tx) = fixture().await;

        let request = tokio::spawn({
            let ipc = ipc.clone();
            async move { ipc.request("early", Value::Null).await }
        });

        let held = tokio::time::timeout(Duration::from_millis(50), rx.next_frame()).await;
        assert!(held.is_err(), "send must wait for the load signal");

        session.mark_loaded();
        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let message = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));

        emit_binding(
            &mut tx,
            json!({"id": message.id, "type": "early", "data": true, "isReply": true}),
        )
        .await;
        assert_eq!(request.await.expect("join").expect("reply"), json!(true));
    }

    #[tokio::test]
    async fn test_notify_leaves_nothing_pending() {
        let (ipc, session, mut rx, mut tx) = fixture().await;
        session.mark_loaded();

        let notify = tokio::spawn({
            let ipc = ipc.clone();
            async move { ipc.notify("tick", json!(1)).await }
        });

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let message = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(message.kind, "tick");

        notify.await.expect("join").expect("notify");
        assert_eq!(ipc.pending_count(), 0);

        // The page acknowledges anyway; the ack is dropped silently.
        emit_binding(
            &mut tx,
            json!({"id": message.id, "type": "pong", "data": null, "isReply": true}),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_timeout_cleans_pending() {
        let (ipc, session, mut rx, mut tx) = fixture().await;
        session.mark_loaded();

        let request = tokio::spawn({
            let ipc = ipc.clone();
            async move {
                ipc.request_with_timeout("slow", Value::Null, Duration::from_millis(40))
                    .await
            }
        });

        expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;

        let err = request.await.expect("join").unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_page_request_first_truthy_listener_wins() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        let hits = Arc::new(AtomicU64::new(0));
        let h1 = Arc::clone(&hits);
        ipc.on("probe", move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
            None
        });
        let h2 = Arc::clone(&hits);
        ipc.on("probe", move |_| {
            h2.fetch_add(1, Ordering::SeqCst);
            Some(json!("from-two"))
        });
        let h3 = Arc::clone(&hits);
        ipc.on("probe", move |_| {
            h3.fetch_add(1, Ordering::SeqCst);
            Some(json!("from-three"))
        });

        emit_binding(
            &mut tx,
            json!({"id": "r1", "type": "probe", "data": {"n": 1}, "isReply": false}),
        )
        .await;

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert!(reply.is_reply);
        assert_eq!(reply.id, "r1");
        assert_eq!(reply.kind, "probe");
        assert_eq!(reply.data, json!("from-two"));

        // Fan-out: every listener ran, not just the winner.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_page_request_falsy_returns_are_skipped() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        ipc.on("check", |_| Some(json!(false)));
        ipc.on("check", |_| Some(json!(0)));
        ipc.on("check", |_| Some(json!("")));
        ipc.on("check", |_| Some(json!("real")));

        emit_binding(
            &mut tx,
            json!({"id": "r2", "type": "check", "data": null, "isReply": false}),
        )
        .await;

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(reply.data, json!("real"));
        assert_eq!(reply.kind, "check");
    }

    #[tokio::test]
    async fn test_page_request_without_listeners_gets_pong() {
        let (_ipc, _session, mut rx, mut tx) = fixture().await;

        emit_binding(
            &mut tx,
            json!({"id": "r3", "type": "nobody", "data": 7, "isReply": false}),
        )
        .await;

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert!(reply.is_reply);
        assert_eq!(reply.id, "r3");
        assert_eq!(reply.kind, "pong");
        assert_eq!(reply.data, Value::Null);
    }

    #[tokio::test]
    async fn test_page_request_all_falsy_gets_pong() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        ipc.on("quiet", |_| Some(json!(0)));

        emit_binding(
            &mut tx,
            json!({"id": "r4", "type": "quiet", "data": null, "isReply": false}),
        )
        .await;

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(reply.kind, "pong");
        assert_eq!(reply.data, Value::Null);
    }

    #[tokio::test]
    async fn test_panicking_listener_is_skipped() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        ipc.on("risky", |_| panic!("listener bug"));
        ipc.on("risky", |_| Some(json!("sane")));

        emit_binding(
            &mut tx,
            json!({"id": "r5", "type": "risky", "data": null, "isReply": false}),
        )
        .await;

        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(reply.data, json!("sane"));
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        let id = ipc.on("gone", |_| Some(json!("answer")));
        assert_eq!(ipc.listener_count("gone"), 1);
        assert!(ipc.remove_listener("gone", id));
        assert!(!ipc.remove_listener("gone", id));
        assert_eq!(ipc.listener_count("gone"), 0);

        emit_binding(
            &mut tx,
            json!({"id": "r6", "type": "gone", "data": null, "isReply": false}),
        )
        .await;
        let sent = expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        let reply = extract_ipc_payload(sent["params"]["expression"].as_str().expect("expr"));
        assert_eq!(reply.kind, "pong");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let (ipc, session, mut rx, mut tx) = fixture().await;

        let event = json!({
            "method": "Runtime.bindingCalled",
            "params": {"name": BINDING_NAME, "payload": "not json", "executionContextId": 1}
        });
        tx.send_frame(&serde_json::to_string(&event).expect("serialize"))
            .await
            .expect("event");

        let held = tokio::time::timeout(Duration::from_millis(50), rx.next_frame()).await;
        assert!(held.is_err(), "garbage must not produce a reply");

        // The channel still works afterwards.
        session.mark_loaded();
        let notify = tokio::spawn({
            let ipc = ipc.clone();
            async move { ipc.notify("alive", Value::Null).await }
        });
        expect_call(&mut rx, &mut tx, "Runtime.evaluate", undefined_result()).await;
        notify.await.expect("join").expect("notify");
    }

    #[tokio::test]
    async fn test_foreign_binding_name_is_ignored() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        ipc.on("probe", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(json!(true))
        });

        let message =
            serde_json::to_string(&json!({"id": "x", "type": "probe", "data": null})).expect("json");
        let event = json!({
            "method": "Runtime.bindingCalled",
            "params": {"name": "someOtherBinding", "payload": message, "executionContextId": 1}
        });
        tx.send_frame(&serde_json::to_string(&event).expect("serialize"))
            .await
            .expect("event");

        let held = tokio::time::timeout(Duration::from_millis(50), rx.next_frame()).await;
        assert!(held.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reply_with_unknown_id_is_silent() {
        let (ipc, _session, mut rx, mut tx) = fixture().await;

        emit_binding(
            &mut tx,
            json!({"id": "never-sent", "type": "greet", "data": 1, "isReply": true}),
        )
        .await;

        let held = tokio::time::timeout(Duration::from_millis(50), rx.next_frame()).await;
        assert!(held.is_err());
        assert_eq!(ipc.pending_count(), 0);
    }

    #[test]
    fn test_is_truthy_matches_javascript() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));

        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }
}
