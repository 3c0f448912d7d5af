//! CDP protocol message types.
//!
//! This module defines the wire format spoken with the browser and the
//! typed shapes decoded out of it.
//!
//! # Message Flow
//!
//! ```text
//! ┌──────────────┐   Envelope {id, method, params, sessionId}   ┌──────────┐
//! │  Host (Rust) │ ───────────────────────────────────────────► │ Chromium │
//! │              │ ◄─────────────────────────────────────────── │          │
//! └──────────────┘   Reply {id, result|error}                   └──────────┘
//!                    Event {method, params, sessionId}
//! ```
//!
//! Inbound frames are classified by the presence of `id`: a frame with
//! an `id` is a [`Reply`] to a pending command, a frame without one is
//! an unsolicited [`Event`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Command, reply and event envelopes |
//! | `types` | Typed reply structures for consumed methods |

// ============================================================================
// Submodules
// ============================================================================

/// Command, reply and event envelopes.
pub mod envelope;

/// Typed reply structures for the CDP methods the crate consumes.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{CdpError, Envelope, Event, Message, Reply};
pub use types::{
    AttachToTargetResult, DebugTarget, EvaluateResult, ExceptionDetails, GetTargetsResult,
    RemoteObject, TargetInfo, VersionInfo, decode,
};
