//! CDP wire envelope types.
//!
//! Defines the message format exchanged with the browser: outbound
//! commands, inbound replies and inbound events. Inbound frames are
//! classified by the presence of `id`: replies carry one, events do
//! not.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Envelope
// ============================================================================

/// An outbound CDP command.
///
/// # Format
///
/// ```json
/// {
///   "id": 3,
///   "method": "Runtime.evaluate",
///   "params": { "expression": "1 + 1" },
///   "sessionId": "8C1F2..."
/// }
/// ```
///
/// `params` and `sessionId` are omitted entirely when absent.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Correlation id, unique per connection.
    pub id: u64,

    /// CDP method name, e.g. `Runtime.evaluate`.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Target session scope, when attached via `Target.attachToTarget`.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Envelope {
    /// Creates a command envelope with no params and no session scope.
    #[inline]
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
            params: None,
            session_id: None,
        }
    }

    /// Attaches method parameters.
    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Scopes the command to a target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

// ============================================================================
// Reply
// ============================================================================

/// An inbound reply to a command, matched by `id`.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 3, "result": { "value": 2 } }
/// ```
///
/// Error:
/// ```json
/// { "id": 3, "error": { "code": -32601, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    /// Matches the command `id`.
    pub id: u64,

    /// Result payload (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if error).
    #[serde(default)]
    pub error: Option<CdpError>,

    /// Session the reply belongs to, when session-scoped.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

impl Reply {
    /// Returns `true` if this reply carries an error object.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, converting an error reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cdp`] if the reply carries an error object.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::cdp(err.code, err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// CdpError
// ============================================================================

/// Error object inside an error reply.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpError {
    /// Numeric error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Optional additional detail.
    #[serde(default)]
    pub data: Option<Value>,
}

// ============================================================================
// Event
// ============================================================================

/// An inbound unsolicited event, identified by `method`.
///
/// # Format
///
/// ```json
/// {
///   "method": "Runtime.bindingCalled",
///   "params": { "name": "...", "payload": "..." },
///   "sessionId": "8C1F2..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name, e.g. `Page.frameStoppedLoading`.
    pub method: String,

    /// Event payload.
    #[serde(default)]
    pub params: Value,

    /// Session the event belongs to, when session-scoped.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

impl Event {
    /// Returns the domain part of the event name (before the dot).
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or(&self.method)
    }

    /// Returns the event name part (after the dot).
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or("")
    }

    /// Gets a string parameter by key.
    ///
    /// Returns empty string if the key is missing or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> &str {
        self.params.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

// ============================================================================
// Message
// ============================================================================

/// Any inbound frame: a reply or an event.
///
/// Replies are tried first so that a frame with an `id` is never
/// misread as an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Reply to a command.
    Reply(Reply),
    /// Unsolicited event.
    Event(Event),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_minimal_serialization() {
        let envelope = Envelope::new(0, "Browser.getVersion");
        let json = serde_json::to_value(&envelope).expect("serialize");

        assert_eq!(json, json!({"id": 0, "method": "Browser.getVersion"}));
    }

    #[test]
    fn test_envelope_full_serialization() {
        let envelope = Envelope::new(7, "Runtime.evaluate")
            .with_params(json!({"expression": "1 + 1"}))
            .with_session("ABC123");
        let json = serde_json::to_value(&envelope).expect("serialize");

        assert_eq!(
            json,
            json!({
                "id": 7,
                "method": "Runtime.evaluate",
                "params": {"expression": "1 + 1"},
                "sessionId": "ABC123"
            })
        );
    }

    #[test]
    fn test_reply_success_parse() {
        let reply: Reply =
            serde_json::from_str(r#"{"id": 3, "result": {"value": 2}}"#).expect("parse");

        assert_eq!(reply.id, 3);
        assert!(!reply.is_error());
        let result = reply.into_result().expect("success");
        assert_eq!(result, json!({"value": 2}));
    }

    #[test]
    fn test_reply_error_parse() {
        let reply: Reply = serde_json::from_str(
            r#"{"id": 3, "error": {"code": -32601, "message": "'Fake.method' wasn't found"}}"#,
        )
        .expect("parse");

        assert!(reply.is_error());
        let err = reply.into_result().unwrap_err();
        assert!(err.is_cdp_error());
        assert!(err.to_string().contains("-32601"));
    }

    #[test]
    fn test_reply_empty_result_is_null() {
        let reply: Reply = serde_json::from_str(r#"{"id": 12}"#).expect("parse");
        assert_eq!(reply.into_result().expect("success"), Value::Null);
    }

    #[test]
    fn test_event_parse() {
        let event: Event = serde_json::from_str(
            r#"{"method": "Runtime.bindingCalled",
                "params": {"name": "hook", "payload": "{}"},
                "sessionId": "S1"}"#,
        )
        .expect("parse");

        assert_eq!(event.method, "Runtime.bindingCalled");
        assert_eq!(event.domain(), "Runtime");
        assert_eq!(event.name(), "bindingCalled");
        assert_eq!(event.get_string("name"), "hook");
        assert_eq!(event.session_id.as_deref(), Some("S1"));
    }

    #[test]
    fn test_message_classifies_reply_by_id() {
        let message: Message =
            serde_json::from_str(r#"{"id": 5, "result": {}}"#).expect("parse");
        assert!(matches!(message, Message::Reply(_)));
    }

    #[test]
    fn test_message_classifies_event_by_method() {
        let message: Message =
            serde_json::from_str(r#"{"method": "Page.frameStoppedLoading", "params": {}}"#)
                .expect("parse");
        assert!(matches!(message, Message::Event(_)));
    }

    #[test]
    fn test_message_event_without_params() {
        let message: Message =
            serde_json::from_str(r#"{"method": "Inspector.detached"}"#).expect("parse");

        match message {
            Message::Event(event) => assert_eq!(event.params, Value::Null),
            Message::Reply(_) => panic!("classified as reply"),
        }
    }
}
