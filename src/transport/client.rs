//! CDP client: correlation engine and event fan-out.
//!
//! One spawned dispatch task owns both transport halves and handles:
//!
//! - Outgoing calls from the Rust API (id allocation done by the
//!   caller, write done by the loop)
//! - Incoming replies, matched against the pending table by id
//! - Incoming events, fanned out to every subscriber in registration
//!   order
//!
//! A reply whose id has no pending entry is dropped silently; a frame
//! that parses as neither reply nor event is logged and dropped. Calls
//! wait indefinitely unless issued through
//! [`call_with_timeout`](CdpClient::call_with_timeout).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Envelope, Event, Message, Reply, decode};

use super::{Transport, TransportReader, TransportWriter};

// ============================================================================
// Constants
// ============================================================================

/// Pending call ceiling before new calls are rejected.
const MAX_PENDING_CALLS: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Map of call ids to reply channels.
type CorrelationMap = FxHashMap<u64, oneshot::Sender<Result<Reply>>>;

/// Event subscriber callback type.
///
/// Called for every unsolicited envelope. Callbacks must return
/// quickly; anything slow belongs in a task the callback spawns.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle for removing an event subscription.
pub type SubscriberId = u64;

/// One entry of the subscriber list.
struct Subscriber {
    id: SubscriberId,
    once: bool,
    callback: EventCallback,
}

// ============================================================================
// ClientCommand
// ============================================================================

/// Internal commands for the dispatch loop.
enum ClientCommand {
    /// Write a call and route its reply.
    Send {
        envelope: Envelope,
        reply_tx: oneshot::Sender<Result<Reply>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(u64),
    /// Close the transport and fail whatever is pending.
    Shutdown,
}

// ============================================================================
// CdpClient
// ============================================================================

/// Handle to a live CDP connection.
///
/// Cheap to clone; all clones share the same connection, pending table
/// and subscriber list. The dispatch loop runs until the transport ends
/// or [`close`](Self::close) is called, then fails every pending call
/// with [`Error::ConnectionClosed`].
pub struct CdpClient {
    /// Channel into the dispatch loop.
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    /// Pending reply table (shared with the loop).
    pending: Arc<Mutex<CorrelationMap>>,
    /// Event subscribers (shared with the loop).
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    /// Next call id. Starts at 0, increments by 1 per call.
    next_id: Arc<AtomicU64>,
    /// Next subscriber id.
    next_subscriber_id: Arc<AtomicU64>,
    /// Set on close and on loop exit. Guards new calls.
    closed: Arc<AtomicBool>,
}

impl Clone for CdpClient {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            pending: Arc::clone(&self.pending),
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
            next_subscriber_id: Arc::clone(&self.next_subscriber_id),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl CdpClient {
    /// Takes ownership of a connected transport and spawns the
    /// dispatch loop.
    #[must_use]
    pub fn connect(transport: Transport) -> Self {
        let (writer, reader) = transport.into_parts();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<CorrelationMap>> = Arc::new(Mutex::new(FxHashMap::default()));
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_dispatch_loop(
            writer,
            reader,
            command_rx,
            Arc::clone(&pending),
            Arc::clone(&subscribers),
            Arc::clone(&closed),
        ));

        Self {
            command_tx,
            pending,
            subscribers,
            next_id: Arc::new(AtomicU64::new(0)),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
            closed,
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Sends a command and waits for its reply.
    ///
    /// Waits indefinitely; use
    /// [`call_with_timeout`](Self::call_with_timeout) for a deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is (or becomes)
    ///   closed
    /// - [`Error::Cdp`] if the browser replies with an error object
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value> {
        let (_id, reply_rx) = self.begin_call(method, params, session_id)?;
        let reply = reply_rx.await.map_err(|_| Error::ConnectionClosed)??;
        reply.into_result()
    }

    /// Sends a command and waits for its reply with a deadline.
    ///
    /// On timeout the pending entry is removed, so a late reply is
    /// dropped instead of leaking.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    /// - everything [`call`](Self::call) can return
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
        deadline: Duration,
    ) -> Result<Value> {
        let (id, reply_rx) = self.begin_call(method, params, session_id)?;

        match timeout(deadline, reply_rx).await {
            Ok(received) => {
                let reply = received.map_err(|_| Error::ConnectionClosed)??;
                reply.into_result()
            }
            Err(_) => {
                let _ = self.command_tx.send(ClientCommand::RemoveCorrelation(id));
                Err(Error::request_timeout(method, deadline.as_millis() as u64))
            }
        }
    }

    /// Sends a command and decodes the reply into a typed structure.
    ///
    /// # Errors
    ///
    /// Everything [`call`](Self::call) can return, plus
    /// [`Error::Protocol`] when the reply shape does not match `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<T> {
        let value = self.call(method, params, session_id).await?;
        decode(value, method)
    }

    /// Allocates an id and hands the call to the dispatch loop.
    fn begin_call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<(u64, oneshot::Receiver<Result<Reply>>)> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        {
            let pending = self.pending.lock();
            if pending.len() >= MAX_PENDING_CALLS {
                warn!(
                    pending = pending.len(),
                    max = MAX_PENDING_CALLS,
                    "too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "too many pending calls: {}/{}",
                    pending.len(),
                    MAX_PENDING_CALLS
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut envelope = Envelope::new(id, method);
        if let Some(params) = params {
            envelope = envelope.with_params(params);
        }
        if let Some(session) = session_id {
            envelope = envelope.with_session(session);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::Send { envelope, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        Ok((id, reply_rx))
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Registers a subscriber for every unsolicited envelope.
    ///
    /// Subscribers run in registration order on the dispatch task.
    pub fn on_event(&self, callback: impl Fn(&Event) + Send + Sync + 'static) -> SubscriberId {
        self.subscribe(false, callback)
    }

    /// Registers a subscriber that is removed after its first delivery.
    pub fn once_event(&self, callback: impl Fn(&Event) + Send + Sync + 'static) -> SubscriberId {
        self.subscribe(true, callback)
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn remove_event(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    fn subscribe(
        &self,
        once: bool,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push(Subscriber {
            id,
            once,
            callback: Arc::new(callback),
        });
        id
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Number of calls waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` once the connection is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    ///
    /// New calls fail immediately with
    /// [`Error::ConnectionClosed`]; calls still pending are failed the
    /// same way when the loop drains. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(ClientCommand::Shutdown);
    }

    // ========================================================================
    // Dispatch Loop
    // ========================================================================

    /// Owns both transport halves until shutdown.
    async fn run_dispatch_loop(
        mut writer: TransportWriter,
        mut reader: TransportReader,
        mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
        pending: Arc<Mutex<CorrelationMap>>,
        subscribers: Arc<Mutex<Vec<Subscriber>>>,
        closed: Arc<AtomicBool>,
    ) {
        loop {
            tokio::select! {
                frame = reader.next_frame() => {
                    match frame {
                        Some(frame) => Self::dispatch_frame(&frame, &pending, &subscribers),
                        None => {
                            debug!("transport stream ended");
                            break;
                        }
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ClientCommand::Send { envelope, reply_tx }) => {
                            Self::handle_send(envelope, reply_tx, &mut writer, &pending).await;
                        }

                        Some(ClientCommand::RemoveCorrelation(id)) => {
                            pending.lock().remove(&id);
                            debug!(id, "removed timed-out correlation");
                        }

                        Some(ClientCommand::Shutdown) => {
                            debug!("shutdown command received");
                            writer.close().await;
                            break;
                        }

                        None => {
                            debug!("command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        Self::fail_pending(&pending);
        debug!("dispatch loop terminated");
    }

    /// Routes one inbound frame.
    fn dispatch_frame(
        frame: &str,
        pending: &Arc<Mutex<CorrelationMap>>,
        subscribers: &Arc<Mutex<Vec<Subscriber>>>,
    ) {
        let message = match serde_json::from_str::<Message>(frame) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, bytes = frame.len(), "failed to parse inbound frame");
                return;
            }
        };

        match message {
            Message::Reply(reply) => {
                let tx = pending.lock().remove(&reply.id);
                match tx {
                    Some(tx) => {
                        let _ = tx.send(Ok(reply));
                    }
                    // Late reply after timeout cleanup, or a peer bug.
                    None => debug!(id = reply.id, "reply for unknown call"),
                }
            }
            Message::Event(event) => Self::deliver_event(&event, subscribers),
        }
    }

    /// Fans an event out to every subscriber in registration order.
    ///
    /// Callbacks run outside the list lock so they may subscribe or
    /// unsubscribe freely.
    fn deliver_event(event: &Event, subscribers: &Arc<Mutex<Vec<Subscriber>>>) {
        let snapshot: Vec<(SubscriberId, bool, EventCallback)> = subscribers
            .lock()
            .iter()
            .map(|s| (s.id, s.once, Arc::clone(&s.callback)))
            .collect();

        if snapshot.is_empty() {
            trace!(method = %event.method, "event with no subscribers");
            return;
        }

        trace!(method = %event.method, subscribers = snapshot.len(), "delivering event");

        let mut spent = Vec::new();
        for (id, once, callback) in snapshot {
            callback(event);
            if once {
                spent.push(id);
            }
        }

        if !spent.is_empty() {
            subscribers.lock().retain(|s| !spent.contains(&s.id));
        }
    }

    /// Writes one call and registers its correlation entry.
    async fn handle_send(
        envelope: Envelope,
        reply_tx: oneshot::Sender<Result<Reply>>,
        writer: &mut TransportWriter,
        pending: &Arc<Mutex<CorrelationMap>>,
    ) {
        let id = envelope.id;

        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(error) => {
                let _ = reply_tx.send(Err(Error::Json(error)));
                return;
            }
        };

        // Correlation entry goes in before the write so a fast reply
        // always finds it.
        pending.lock().insert(id, reply_tx);

        if let Err(error) = writer.send_frame(&json).await {
            if let Some(tx) = pending.lock().remove(&id) {
                let _ = tx.send(Err(Error::connection(error.to_string())));
            }
            return;
        }

        trace!(id, method = %envelope.method, "call sent");
    }

    /// Fails every pending call with `ConnectionClosed`.
    fn fail_pending(pending: &Arc<Mutex<CorrelationMap>>) {
        let drained: Vec<_> = pending.lock().drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "failed pending calls on shutdown");
        }
    }
}

impl fmt::Debug for CdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpClient")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GetTargetsResult;
    use crate::transport::pipe::{PipeReader, PipeWriter};
    use futures_util::future::join_all;
    use serde_json::json;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type PeerReader = PipeReader<ReadHalf<DuplexStream>>;
    type PeerWriter = PipeWriter<WriteHalf<DuplexStream>>;

    /// Client wired to an in-memory peer playing the browser role.
    fn pipe_client() -> (CdpClient, PeerReader, PeerWriter) {
        let (host_side, peer_side) = tokio::io::duplex(64 * 1024);
        let (host_read, host_write) = tokio::io::split(host_side);
        let (peer_read, peer_write) = tokio::io::split(peer_side);

        let client = CdpClient::connect(Transport::pipe(host_write, host_read));
        (client, PipeReader::new(peer_read), PipeWriter::new(peer_write))
    }

    async fn read_envelope(reader: &mut PeerReader) -> Value {
        let frame = reader.next_frame().await.expect("peer frame");
        serde_json::from_str(&frame).expect("valid json")
    }

    #[tokio::test]
    async fn test_call_resolves_with_result() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Browser.getVersion", None, None).await }
        });

        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(sent, json!({"id": 0, "method": "Browser.getVersion"}));

        peer_tx
            .send_frame(r#"{"id":0,"result":{"product":"Chrome/126"}}"#)
            .await
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"product": "Chrome/126"}));
    }

    #[tokio::test]
    async fn test_call_ids_start_at_zero_and_increment() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let calls = join_all((0..5).map(|_| client.call("Page.enable", None, None)));
        let driver = tokio::spawn(async move {
            for expected in 0..5u64 {
                let sent = read_envelope(&mut peer_rx).await;
                assert_eq!(sent["id"], json!(expected), "wire order must follow ids");
                peer_tx
                    .send_frame(&format!(r#"{{"id":{expected},"result":{{}}}}"#))
                    .await
                    .unwrap();
            }
        });

        for outcome in calls.await {
            outcome.unwrap();
        }
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_replies_resolve_correct_callers() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.call("Target.getTargets", None, None).await }
        });
        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(sent["id"], json!(0));

        let second = tokio::spawn({
            let client = client.clone();
            async move { client.call("Browser.getVersion", None, None).await }
        });
        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(sent["id"], json!(1));

        // Replies arrive in reverse order.
        peer_tx
            .send_frame(r#"{"id":1,"result":{"which":"version"}}"#)
            .await
            .unwrap();
        peer_tx
            .send_frame(r#"{"id":0,"result":{"which":"targets"}}"#)
            .await
            .unwrap();

        assert_eq!(
            first.await.unwrap().unwrap(),
            json!({"which": "targets"})
        );
        assert_eq!(
            second.await.unwrap().unwrap(),
            json!({"which": "version"})
        );
    }

    #[tokio::test]
    async fn test_session_id_stamped_on_wire() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .call("Runtime.enable", None, Some("SESSION-A"))
                    .await
            }
        });

        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(
            sent,
            json!({"id": 0, "method": "Runtime.enable", "sessionId": "SESSION-A"})
        );

        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();
        call.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cdp_error_reply_surfaces() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Fake.method", None, None).await }
        });

        read_envelope(&mut peer_rx).await;
        peer_tx
            .send_frame(r#"{"id":0,"error":{"code":-32601,"message":"'Fake.method' wasn't found"}}"#)
            .await
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_cdp_error());
    }

    #[tokio::test]
    async fn test_reply_with_unknown_id_is_silent_noop() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        // Nothing pending; this must be swallowed without effect.
        peer_tx.send_frame(r#"{"id":99,"result":{}}"#).await.unwrap();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        read_envelope(&mut peer_rx).await;
        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();

        call.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_replies_never_reach_event_subscribers() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_subscriber = Arc::clone(&seen);
        client.on_event(move |event| {
            seen_by_subscriber.lock().push(event.method.clone());
        });

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        read_envelope(&mut peer_rx).await;

        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();
        peer_tx
            .send_frame(r#"{"method":"Page.frameStoppedLoading","params":{"frameId":"F1"}}"#)
            .await
            .unwrap();

        call.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.lock().as_slice(), ["Page.frameStoppedLoading"]);
    }

    #[tokio::test]
    async fn test_event_fanout_in_registration_order() {
        let (client, _peer_rx, mut peer_tx) = pipe_client();

        let order: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        client.on_event(move |_| first.lock().push(1));
        client.on_event(move |_| second.lock().push(2));

        peer_tx
            .send_frame(r#"{"method":"Runtime.executionContextCreated","params":{}}"#)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(order.lock().as_slice(), [1, 2]);
    }

    #[tokio::test]
    async fn test_once_subscriber_fires_once() {
        let (client, _peer_rx, mut peer_tx) = pipe_client();

        let once_hits = Arc::new(AtomicU64::new(0));
        let every_hits = Arc::new(AtomicU64::new(0));

        let once_counter = Arc::clone(&once_hits);
        client.once_event(move |_| {
            once_counter.fetch_add(1, Ordering::SeqCst);
        });
        let every_counter = Arc::clone(&every_hits);
        client.on_event(move |_| {
            every_counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..2 {
            peer_tx
                .send_frame(r#"{"method":"Page.frameStoppedLoading","params":{}}"#)
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(once_hits.load(Ordering::SeqCst), 1);
        assert_eq!(every_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_event_stops_delivery() {
        let (client, _peer_rx, mut peer_tx) = pipe_client();

        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let subscriber = client.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(client.remove_event(subscriber));
        assert!(!client.remove_event(subscriber));

        peer_tx
            .send_frame(r#"{"method":"Page.frameStoppedLoading","params":{}}"#)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_then_call_rejects_immediately() {
        let (client, _peer_rx, _peer_tx) = pipe_client();

        client.close();
        let err = client.call("Page.enable", None, None).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_close_fails_pending_calls() {
        let (client, mut peer_rx, _peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        read_envelope(&mut peer_rx).await;

        client.close();
        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_closed());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_peer_disconnect_fails_pending_calls() {
        let (client, mut peer_rx, peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        read_envelope(&mut peer_rx).await;

        drop(peer_rx);
        drop(peer_tx);

        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_call_with_timeout_expires_and_cleans_up() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let err = {
            let call = client.call_with_timeout(
                "Runtime.evaluate",
                Some(json!({"expression": "1"})),
                None,
                Duration::from_millis(30),
            );
            let driver = async {
                read_envelope(&mut peer_rx).await;
            };
            let (outcome, ()) = tokio::join!(call, driver);
            outcome.unwrap_err()
        };
        assert!(err.is_timeout());

        // Late reply is a no-op; the connection stays usable.
        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.pending_count(), 0);

        let next = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(sent["id"], json!(1));
        peer_tx.send_frame(r#"{"id":1,"result":{}}"#).await.unwrap();
        next.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_call_as_decodes_typed_reply() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .call_as::<GetTargetsResult>("Target.getTargets", None, None)
                    .await
            }
        });

        read_envelope(&mut peer_rx).await;
        peer_tx
            .send_frame(
                r#"{"id":0,"result":{"targetInfos":[{"targetId":"T1","type":"page","title":"","url":"about:blank","attached":false}]}}"#,
            )
            .await
            .unwrap();

        let targets = call.await.unwrap().unwrap();
        assert_eq!(targets.target_infos.len(), 1);
        assert_eq!(targets.target_infos[0].target_id, "T1");
    }

    #[tokio::test]
    async fn test_pending_count_tracks_in_flight_calls() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("Page.enable", None, None).await }
        });
        read_envelope(&mut peer_rx).await;
        assert_eq!(client.pending_count(), 1);

        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();
        call.await.unwrap().unwrap();
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_connection_state() {
        let (client, mut peer_rx, mut peer_tx) = pipe_client();
        let clone = client.clone();

        let call = tokio::spawn(async move { clone.call("Page.enable", None, None).await });
        let sent = read_envelope(&mut peer_rx).await;
        assert_eq!(sent["id"], json!(0));
        peer_tx.send_frame(r#"{"id":0,"result":{}}"#).await.unwrap();
        call.await.unwrap().unwrap();

        client.close();
        let clone = client.clone();
        assert!(clone.is_closed());
        assert!(clone.call("Page.enable", None, None).await.unwrap_err().is_closed());
    }
}
