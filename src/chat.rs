//! Chat reconciler
//!
//! Keeps the transcript consistent with a single active session: seeds it
//! from the start-time opening message, from fetched history, or from a
//! trace-derived fallback; appends optimistically on send; and discards
//! late-arriving results for sessions that have since been stopped or
//! replaced.

use crate::backend::{ExecutionBackend, HistoryMessage};
use crate::session::SessionHandle;
use crate::trace::TraceTree;
use crate::transcript::{ChatEntry, Role, Transcript, SEND_FAILURE_NOTICE};

use std::sync::{Arc, Mutex};

/// How a send settled in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDisposition {
    /// The engine replied; its text was appended
    Replied,
    /// The transport failed; a synthesized notice was appended instead
    Recovered,
    /// The session was stopped mid-flight; the result was discarded
    Stale,
    /// No session is bound; nothing was sent
    NotBound,
}

/// What a send produced beyond transcript entries
///
/// The caller (lifecycle controller) owns what happens next: merging the
/// trace fragment and adopting a rotated session id.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub disposition: SendDisposition,
    pub trace_fragment: Option<crate::trace::TraceNode>,
    pub new_session_id: Option<String>,
}

impl SendOutcome {
    fn bare(disposition: SendDisposition) -> Self {
        Self {
            disposition,
            trace_fragment: None,
            new_session_id: None,
        }
    }
}

/// Reconciles the chat transcript against one session generation
///
/// Cloning is cheap and shares state, which lets in-flight history loads
/// run as background tasks while the owner keeps using the reconciler.
/// Every state-updating step of async work re-checks the captured session
/// handle first, so results landing after a stop or a rebind are dropped.
#[derive(Clone, Default)]
pub struct ChatReconciler {
    transcript: Arc<Mutex<Transcript>>,
    bound: Arc<Mutex<Option<SessionHandle>>>,
}

impl ChatReconciler {
    /// Creates an unbound reconciler with an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a fresh session generation, clearing any previous transcript
    ///
    /// When the start call already produced an opening message it seeds the
    /// transcript directly and no history fetch is needed; the return value
    /// says whether that happened.
    pub fn bind(&self, handle: SessionHandle, initial_message: Option<String>) -> bool {
        if let Ok(mut bound) = self.bound.lock() {
            *bound = Some(handle);
        }
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.clear();
            if let Some(text) = initial_message {
                transcript.push(ChatEntry::assistant(text));
                return true;
            }
        }
        false
    }

    /// Swaps the bound handle without touching the transcript
    ///
    /// Used on session-id rotation: the identity changes, the conversation
    /// does not.
    pub fn rebind(&self, handle: SessionHandle) {
        if let Ok(mut bound) = self.bound.lock() {
            *bound = Some(handle);
        }
    }

    /// Clears the transcript and drops the binding unconditionally
    ///
    /// The bound handle is revoked first so that any in-flight history or
    /// fallback load cannot repopulate what was just cleared.
    pub fn clear(&self) {
        if let Ok(mut bound) = self.bound.lock() {
            if let Some(handle) = bound.take() {
                handle.revoke();
            }
        }
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.clear();
        }
    }

    /// The currently bound handle, if any
    pub fn bound_handle(&self) -> Option<SessionHandle> {
        self.bound.lock().ok().and_then(|bound| bound.clone())
    }

    /// Snapshot of the transcript entries, in order
    pub fn entries(&self) -> Vec<ChatEntry> {
        self.transcript
            .lock()
            .map(|transcript| transcript.entries().to_vec())
            .unwrap_or_default()
    }

    /// Number of transcript entries
    pub fn len(&self) -> usize {
        self.transcript
            .lock()
            .map(|transcript| transcript.len())
            .unwrap_or(0)
    }

    /// True when the transcript holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adopts fetched history verbatim, tagging each entry locally
    ///
    /// No-op when the generation that issued the fetch has been revoked.
    pub fn adopt_history(&self, handle: &SessionHandle, messages: &[HistoryMessage]) {
        if handle.is_stopped() {
            tracing::warn!(session_id = %handle.id(), "discarding stale history load");
            return;
        }
        if let Ok(mut transcript) = self.transcript.lock() {
            for message in messages {
                let role = Role::parse_lossy(&message.role);
                let entry = match role {
                    Role::User => ChatEntry::user(&message.content),
                    Role::Assistant => ChatEntry::assistant(&message.content),
                };
                transcript.push(entry);
            }
        }
    }

    /// Seeds a synthetic opening message from the trace, if one is found
    ///
    /// The first node carrying `metadata.output` within the bounded search
    /// depth becomes an assistant entry. No-op on a revoked generation or
    /// when the trace has no observable output yet.
    pub fn seed_fallback(&self, handle: &SessionHandle, trace: &TraceTree) {
        if handle.is_stopped() {
            tracing::warn!(session_id = %handle.id(), "discarding stale fallback seed");
            return;
        }
        let Some(output) = trace.first_output() else {
            tracing::debug!(session_id = %handle.id(), "no trace output for opening message");
            return;
        };
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(ChatEntry::assistant(output));
        }
    }

    /// Loads the transcript for the bound session
    ///
    /// Fetches history; non-empty history is adopted verbatim, while empty
    /// history or a failed fetch falls back to the trace-derived opening
    /// message. Takes owned shared state so callers can either await it
    /// inline or spawn it and move on.
    pub async fn load_history(
        &self,
        backend: Arc<dyn ExecutionBackend>,
        trace: Arc<Mutex<TraceTree>>,
    ) {
        let Some(handle) = self.bound_handle() else {
            return;
        };

        let fetched = backend.fetch_history(handle.id()).await;

        match fetched {
            Ok(messages) if !messages.is_empty() => self.adopt_history(&handle, &messages),
            Ok(_) => {
                if let Ok(tree) = trace.lock() {
                    self.seed_fallback(&handle, &tree);
                }
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %handle.id(),
                    %error,
                    "history fetch failed, deriving opening message from trace"
                );
                if let Ok(tree) = trace.lock() {
                    self.seed_fallback(&handle, &tree);
                }
            }
        }
    }

    /// Sends a chat turn and reconciles the result into the transcript
    ///
    /// The user entry is appended immediately for responsiveness. The
    /// terminal entry is the engine's reply on success, or a synthesized
    /// notice on transport failure, so a sent message always settles
    /// visibly. A result arriving after the generation was revoked is
    /// discarded without touching the transcript.
    pub async fn send(&self, backend: &dyn ExecutionBackend, text: &str) -> SendOutcome {
        let Some(handle) = self.bound_handle() else {
            return SendOutcome::bare(SendDisposition::NotBound);
        };

        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(ChatEntry::user(text));
        }

        let result = backend.send_message(handle.id(), text).await;

        if handle.is_stopped() {
            tracing::warn!(session_id = %handle.id(), "discarding reply for stopped session");
            return SendOutcome::bare(SendDisposition::Stale);
        }

        match result {
            Ok(reply) => {
                if let Ok(mut transcript) = self.transcript.lock() {
                    transcript.push(ChatEntry::assistant(&reply.response));
                }
                SendOutcome {
                    disposition: SendDisposition::Replied,
                    trace_fragment: reply.trace_fragment,
                    new_session_id: reply.new_session_id,
                }
            }
            Err(error) => {
                tracing::warn!(session_id = %handle.id(), %error, "send failed, recovering locally");
                if let Ok(mut transcript) = self.transcript.lock() {
                    transcript.push(ChatEntry::assistant(SEND_FAILURE_NOTICE));
                }
                SendOutcome::bare(SendDisposition::Recovered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeBackend;
    use crate::trace::{session_root, TraceNode};
    use serde_json::json;
    use std::time::Duration;

    fn bound_reconciler(id: &str) -> (ChatReconciler, SessionHandle) {
        let chat = ChatReconciler::new();
        let handle = SessionHandle::new(id);
        chat.bind(handle.clone(), None);
        (chat, handle)
    }

    #[test]
    fn test_bind_seeds_initial_message() {
        let chat = ChatReconciler::new();
        let seeded = chat.bind(SessionHandle::new("abc123"), Some("Hi!".to_string()));

        assert!(seeded);
        let entries = chat.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::Assistant);
        assert_eq!(entries[0].content, "Hi!");
    }

    #[test]
    fn test_bind_clears_previous_transcript() {
        let (chat, _handle) = bound_reconciler("abc123");
        chat.adopt_history(
            &chat.bound_handle().unwrap(),
            &[HistoryMessage {
                role: "user".to_string(),
                content: "old".to_string(),
            }],
        );
        assert_eq!(chat.len(), 1);

        chat.bind(SessionHandle::new("xyz789"), None);
        assert!(chat.is_empty());
    }

    #[test]
    fn test_adopt_history_preserves_backend_order() {
        let (chat, handle) = bound_reconciler("abc123");
        chat.adopt_history(
            &handle,
            &[
                HistoryMessage {
                    role: "assistant".to_string(),
                    content: "Hello!".to_string(),
                },
                HistoryMessage {
                    role: "user".to_string(),
                    content: "Hi there".to_string(),
                },
            ],
        );

        let entries = chat.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::Assistant);
        assert_eq!(entries[1].role, Role::User);
        assert!(!entries[0].id.is_empty());
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn test_adopt_history_after_revoke_is_noop() {
        let (chat, handle) = bound_reconciler("abc123");
        handle.revoke();

        chat.adopt_history(
            &handle,
            &[HistoryMessage {
                role: "user".to_string(),
                content: "late".to_string(),
            }],
        );
        assert!(chat.is_empty());
    }

    #[test]
    fn test_seed_fallback_uses_first_output() {
        let (chat, handle) = bound_reconciler("abc123");
        let mut tree = TraceTree::new();
        tree.load(session_root(
            "abc123",
            vec![TraceNode::new("step-1", "Greet", "step")
                .with_metadata("output", json!("Hello, World!"))],
        ));

        chat.seed_fallback(&handle, &tree);

        let entries = chat.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "Hello, World!");
        assert_eq!(entries[0].role, Role::Assistant);
    }

    #[test]
    fn test_seed_fallback_without_output_is_noop() {
        let (chat, handle) = bound_reconciler("abc123");
        let tree = TraceTree::new();
        chat.seed_fallback(&handle, &tree);
        assert!(chat.is_empty());
    }

    #[test]
    fn test_clear_revokes_binding() {
        let (chat, handle) = bound_reconciler("abc123");
        chat.clear();

        assert!(handle.is_stopped());
        assert!(chat.bound_handle().is_none());
        assert!(chat.is_empty());
    }

    #[tokio::test]
    async fn test_load_history_adopts_non_empty() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend: Arc<dyn ExecutionBackend> = Arc::new(FakeBackend::new().with_history(vec![
            HistoryMessage {
                role: "assistant".to_string(),
                content: "Welcome back".to_string(),
            },
        ]));

        chat.load_history(backend, Arc::new(Mutex::new(TraceTree::new())))
            .await;

        assert_eq!(chat.entries()[0].content, "Welcome back");
    }

    #[tokio::test]
    async fn test_load_history_empty_falls_back_to_trace() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend: Arc<dyn ExecutionBackend> = Arc::new(FakeBackend::new());

        let mut tree = TraceTree::new();
        tree.load(session_root(
            "abc123",
            vec![TraceNode::new("step-1", "Greet", "step")
                .with_metadata("output", json!("Hello, World!"))],
        ));

        chat.load_history(backend, Arc::new(Mutex::new(tree))).await;

        let entries = chat.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "Hello, World!");
    }

    #[tokio::test]
    async fn test_load_history_failure_falls_back_to_trace() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend: Arc<dyn ExecutionBackend> =
            Arc::new(FakeBackend::new().with_history_failure());

        let mut tree = TraceTree::new();
        tree.load(session_root(
            "abc123",
            vec![TraceNode::new("step-1", "Greet", "step")
                .with_metadata("output", json!("Hello, World!"))],
        ));

        chat.load_history(backend, Arc::new(Mutex::new(tree))).await;
        assert_eq!(chat.entries()[0].content, "Hello, World!");
    }

    #[tokio::test]
    async fn test_stop_wins_over_in_flight_history_load() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend: Arc<dyn ExecutionBackend> = Arc::new(
            FakeBackend::new()
                .with_history(vec![HistoryMessage {
                    role: "assistant".to_string(),
                    content: "too late".to_string(),
                }])
                .with_delay(Duration::from_millis(50)),
        );

        let load = tokio::spawn({
            let chat = chat.clone();
            let backend = backend.clone();
            async move {
                chat.load_history(backend, Arc::new(Mutex::new(TraceTree::new())))
                    .await;
            }
        });

        // Teardown lands while the fetch is still sleeping.
        chat.clear();
        load.await.unwrap();

        assert!(chat.is_empty());
    }

    #[tokio::test]
    async fn test_send_appends_user_then_reply() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend = FakeBackend::new().with_reply("Hello there!");

        let outcome = chat.send(&backend, "hi").await;

        assert_eq!(outcome.disposition, SendDisposition::Replied);
        let entries = chat.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "hi");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].content, "Hello there!");
    }

    #[tokio::test]
    async fn test_send_failure_appends_notice() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend = FakeBackend::new().with_send_failure();

        let outcome = chat.send(&backend, "hi").await;

        assert_eq!(outcome.disposition, SendDisposition::Recovered);
        let entries = chat.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, SEND_FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn test_send_always_settles_with_exactly_two_entries() {
        for backend in [
            FakeBackend::new().with_reply("ok"),
            FakeBackend::new().with_send_failure(),
        ] {
            let (chat, _handle) = bound_reconciler("abc123");
            chat.send(&backend, "hi").await;
            assert_eq!(chat.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_send_unbound_is_noop() {
        let chat = ChatReconciler::new();
        let backend = FakeBackend::new().with_reply("ok");

        let outcome = chat.send(&backend, "hi").await;

        assert_eq!(outcome.disposition, SendDisposition::NotBound);
        assert!(chat.is_empty());
    }

    #[tokio::test]
    async fn test_send_surfaces_rotation() {
        let (chat, _handle) = bound_reconciler("abc123");
        let backend = FakeBackend::new()
            .with_reply("Session expired. This is a new session. How can I help you?")
            .with_rotation("xyz789");

        let outcome = chat.send(&backend, "hi").await;

        assert_eq!(outcome.new_session_id, Some("xyz789".to_string()));
        assert_eq!(outcome.disposition, SendDisposition::Replied);
    }
}
