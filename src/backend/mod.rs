//! Execution backend abstraction
//!
//! The remote playbook execution engine is reached only through the narrow
//! request/response contract defined here. [`ExecutionBackend`] is the trait
//! seam: production code uses the HTTP implementation in [`http`], tests
//! substitute a scripted fake.
//!
//! All calls are asynchronous and safe to issue concurrently; no call
//! acquires a lock on the session. Correctness under interleaving is the
//! lifecycle controller's job, not the client's.

pub mod http;

pub use http::HttpBackend;

use crate::error::Result;
use crate::trace::TraceNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a successful start (or start-with-reuse) call
///
/// The backend may ignore a requested `existing_session_id` and assign a
/// fresh one; the id returned here is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedSession {
    /// Backend-assigned session identifier
    pub session_id: String,
    /// Opening message produced while starting the playbook, if any
    pub initial_message: Option<String>,
}

/// One message from the backend's stored history
///
/// History entries carry no id; the transcript tags them locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Full state of an existing session, as fetched on resume
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The playbook source the session was started with
    pub playbook: String,
    /// Trace forest, normalized from whatever shape the backend delivered
    pub traces: Vec<TraceNode>,
    /// Stored chat history; `None` when the backend omitted the field
    pub messages: Option<Vec<HistoryMessage>>,
}

/// The engine's reply to a chat turn
#[derive(Debug, Clone)]
pub struct MessageReply {
    /// Reply text to append to the transcript
    pub response: String,
    /// Incremental trace update to merge, if the engine produced one
    pub trace_fragment: Option<TraceNode>,
    /// Rotated session identity; callers must adopt it when present
    pub new_session_id: Option<String>,
}

/// Request/response contract with the remote execution engine
///
/// Implementations are stateless request translators. Every method is
/// independently retriable from the caller's point of view; `stop` is
/// best-effort and its failure does not block local teardown.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Starts a new execution, optionally asking to reuse an existing id
    ///
    /// # Errors
    ///
    /// Returns a transport failure when the backend is unreachable or
    /// rejects the request.
    async fn start(
        &self,
        playbook: &str,
        existing_session_id: Option<&str>,
    ) -> Result<StartedSession>;

    /// Fetches the full state of an existing session
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PlaypenError::SessionNotFound`] when the id
    /// is unknown or expired; transport failures otherwise.
    async fn resume(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// Appends a user turn and returns the engine's reply
    async fn send_message(&self, session_id: &str, text: &str) -> Result<MessageReply>;

    /// Asks the backend to stop the session (best-effort)
    async fn stop(&self, session_id: &str) -> Result<()>;

    /// Fetches the session's trace forest
    async fn fetch_trace(&self, session_id: &str) -> Result<Vec<TraceNode>>;

    /// Fetches the session's stored chat history
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>>;

    /// Lists the backend's example playbook catalog, keyed by title
    async fn list_playbooks(&self) -> Result<BTreeMap<String, String>>;
}
