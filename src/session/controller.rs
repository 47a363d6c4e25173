//! Session lifecycle controller
//!
//! The top-level state machine. It owns the current session id, decides
//! when to start, resume, and stop, mirrors the id into the playground URL
//! for shareability, and keeps the chat transcript and trace tree bound to
//! exactly one logical session through rotations, expirations, and races
//! between "stop" and in-flight loads.

use crate::backend::ExecutionBackend;
use crate::chat::{ChatReconciler, SendDisposition};
use crate::error::{is_session_not_found, PlaypenError, Result};
use crate::session::guard::SessionHandle;
use crate::session::url_state::PlaygroundUrl;
use crate::trace::{self, AnchorPath, TraceTree};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cooldown after a settled stop before URL resumes are honored again
///
/// Clearing the URL parameter and observing the URL race each other around
/// a stop; suppressing resumes for a beat keeps the stale id from being
/// reloaded.
const STOP_RELOAD_COOLDOWN: Duration = Duration::from_millis(500);

/// Where the controller is in a session's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session bound; start and resume are permitted
    Idle,
    /// A start call is in flight
    Starting,
    /// A resume-from-URL call is in flight
    Resuming,
    /// A session is bound; send, stop, and share are permitted
    Active,
    /// A stop is being applied locally
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Resuming => write!(f, "resuming"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Orchestrates one logical session across three views
///
/// The controller is the single writer of the session id; the URL, the
/// transcript, and the trace tree only mirror it. All sequencing guarantees
/// (stop beats late loads, one resume per URL id, rotation without a state
/// flicker) live here rather than in the stateless backend client.
pub struct SessionController {
    backend: Arc<dyn ExecutionBackend>,
    state: LifecycleState,
    current: Option<SessionHandle>,
    playbook: String,
    url: PlaygroundUrl,
    chat: ChatReconciler,
    trace: Arc<Mutex<TraceTree>>,
    prevent_reload: Arc<AtomicBool>,
    reload_cooldown: Duration,
    last_url_attach: Option<String>,
    stop_task: Option<tokio::task::JoinHandle<()>>,
}

impl SessionController {
    /// Creates an idle controller for the given backend and playground base
    ///
    /// # Errors
    ///
    /// Fails when the playground base URL does not parse.
    pub fn new(backend: Arc<dyn ExecutionBackend>, playground_base: &str) -> Result<Self> {
        Ok(Self {
            backend,
            state: LifecycleState::Idle,
            current: None,
            playbook: String::new(),
            url: PlaygroundUrl::new(playground_base)?,
            chat: ChatReconciler::new(),
            trace: Arc::new(Mutex::new(TraceTree::new())),
            prevent_reload: Arc::new(AtomicBool::new(false)),
            reload_cooldown: STOP_RELOAD_COOLDOWN,
            last_url_attach: None,
            stop_task: None,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The bound session id, if a session is live
    pub fn session_id(&self) -> Option<String> {
        self.current.as_ref().map(|handle| handle.id().to_string())
    }

    /// The playbook source the bound session runs
    pub fn playbook(&self) -> &str {
        &self.playbook
    }

    /// The chat reconciler bound to the current session
    pub fn chat(&self) -> &ChatReconciler {
        &self.chat
    }

    /// Shared handle to the trace tree
    pub fn trace(&self) -> Arc<Mutex<TraceTree>> {
        Arc::clone(&self.trace)
    }

    /// The playground URL, session binding included
    pub fn url(&self) -> &PlaygroundUrl {
        &self.url
    }

    /// The shareable URL, available only while a session is active
    ///
    /// The URL already encodes the session id; sharing is verbatim.
    pub fn share_url(&self) -> Option<String> {
        match self.state {
            LifecycleState::Active => Some(self.url.as_str().to_string()),
            _ => None,
        }
    }

    /// Writes a session id into the URL binding without contacting anyone
    ///
    /// Used when the user pastes a share target; a following
    /// [`attach`](Self::attach) performs the actual resume.
    pub fn bind_url_session(&mut self, session_id: &str) {
        self.url.set_session_id(Some(session_id));
    }

    /// True while resume-from-URL is suppressed after a stop
    pub fn reload_suppressed(&self) -> bool {
        self.prevent_reload.load(Ordering::SeqCst)
    }

    /// Overrides the post-stop resume suppression cooldown
    pub fn set_reload_cooldown(&mut self, cooldown: Duration) {
        self.reload_cooldown = cooldown;
    }

    /// Starts a new session from playbook source
    ///
    /// Any previous binding is cleared first. On success the controller is
    /// `Active`, the URL carries the backend-assigned id (authoritative even
    /// when `reuse_session_id` asked for another), and the transcript is
    /// seeded from the opening message or, failing that, from a background
    /// history load.
    ///
    /// # Errors
    ///
    /// A transport failure is terminal for the attempt: the controller
    /// reverts to `Idle` and the error is surfaced.
    pub async fn start(&mut self, playbook: &str, reuse_session_id: Option<&str>) -> Result<()> {
        if self.state != LifecycleState::Idle {
            return Err(PlaypenError::InvalidState(format!(
                "cannot start while {}",
                self.state
            ))
            .into());
        }

        self.teardown_views();
        self.state = LifecycleState::Starting;
        tracing::info!("starting playbook session");

        let started = match self.backend.start(playbook, reuse_session_id).await {
            Ok(started) => started,
            Err(error) => {
                self.state = LifecycleState::Idle;
                return Err(error);
            }
        };

        let handle = SessionHandle::new(started.session_id);
        self.playbook = playbook.to_string();
        self.url.set_session_id(Some(handle.id()));

        let seeded = self.chat.bind(handle.clone(), started.initial_message);
        if !seeded {
            self.spawn_history_load();
        }
        self.spawn_trace_load(handle.clone());

        tracing::info!(session_id = %handle.id(), "session active");
        self.current = Some(handle);
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// Resumes the session named by the URL binding, if any
    ///
    /// Triggered once per distinct URL session id, and skipped entirely
    /// while the post-stop suppression window is open. Returns whether a
    /// session became active.
    ///
    /// # Errors
    ///
    /// Transport failures are surfaced and leave the controller `Idle`. A
    /// backend "not found" is not an error: the stale URL binding is
    /// removed and the controller stays `Idle`.
    pub async fn attach(&mut self) -> Result<bool> {
        if self.state != LifecycleState::Idle {
            return Ok(false);
        }
        if self.reload_suppressed() {
            tracing::debug!("resume-from-URL suppressed during stop cooldown");
            return Ok(false);
        }
        let Some(session_id) = self.url.session_id() else {
            return Ok(false);
        };
        if self.last_url_attach.as_deref() == Some(session_id.as_str()) {
            return Ok(false);
        }
        self.last_url_attach = Some(session_id.clone());

        self.state = LifecycleState::Resuming;
        tracing::info!(%session_id, "resuming session from URL");

        let snapshot = match self.backend.resume(&session_id).await {
            Ok(snapshot) => snapshot,
            Err(error) if is_session_not_found(&error) => {
                tracing::warn!(%session_id, "session expired, clearing URL binding");
                self.teardown_views();
                self.state = LifecycleState::Idle;
                return Ok(false);
            }
            Err(error) => {
                // A transport failure must stay retryable: forget the
                // attempt marker so the same URL id can be tried again.
                self.last_url_attach = None;
                self.state = LifecycleState::Idle;
                return Err(error);
            }
        };

        let handle = SessionHandle::new(session_id);
        self.playbook = snapshot.playbook;
        if let Ok(mut tree) = self.trace.lock() {
            tree.load(trace::session_root(handle.id(), snapshot.traces));
        }

        self.chat.bind(handle.clone(), None);
        match snapshot.messages {
            Some(messages) if !messages.is_empty() => {
                self.chat.adopt_history(&handle, &messages);
            }
            Some(_) => {
                // The snapshot already answered "no history"; derive the
                // opening message from the trace without another round trip.
                if let Ok(tree) = self.trace.lock() {
                    self.chat.seed_fallback(&handle, &tree);
                }
            }
            None => self.spawn_history_load(),
        }

        tracing::info!(session_id = %handle.id(), "session active");
        self.current = Some(handle);
        self.state = LifecycleState::Active;
        Ok(true)
    }

    /// Sends a chat turn through the bound session
    ///
    /// The reply's trace fragment, if any, is merged under the first
    /// section; a rotated session id is adopted transparently without
    /// leaving `Active`.
    ///
    /// # Errors
    ///
    /// Only an invalid state is an error. Transport failures settle in the
    /// transcript as a synthesized notice and the session stays `Active`.
    pub async fn send(&mut self, text: &str) -> Result<SendDisposition> {
        if self.state != LifecycleState::Active {
            return Err(PlaypenError::InvalidState(format!(
                "send requires an active session, currently {}",
                self.state
            ))
            .into());
        }

        let outcome = self.chat.send(self.backend.as_ref(), text).await;

        if let Some(fragment) = outcome.trace_fragment {
            if let Ok(mut tree) = self.trace.lock() {
                tree.merge_fragment(&AnchorPath::FirstSection, fragment);
            }
        }
        if let Some(new_session_id) = outcome.new_session_id {
            self.rotate(new_session_id);
        }

        Ok(outcome.disposition)
    }

    /// Stops the bound session
    ///
    /// Local state, transcript, trace, and URL clear synchronously; the
    /// backend stop is fire-and-forget. Resume-from-URL stays suppressed
    /// until a short cooldown after the backend call settles.
    ///
    /// # Errors
    ///
    /// Only when no session is active.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != LifecycleState::Active {
            return Err(PlaypenError::InvalidState(format!(
                "stop requires an active session, currently {}",
                self.state
            ))
            .into());
        }

        let Some(handle) = self.current.take() else {
            return Err(
                PlaypenError::InvalidState("active state without a bound session".to_string())
                    .into(),
            );
        };

        self.state = LifecycleState::Stopping;
        self.prevent_reload.store(true, Ordering::SeqCst);

        handle.revoke();
        let session_id = handle.id().to_string();
        tracing::info!(%session_id, "stopping session");

        self.chat.clear();
        if let Ok(mut tree) = self.trace.lock() {
            tree.clear();
        }
        self.url.set_session_id(None);
        self.state = LifecycleState::Idle;

        let backend = Arc::clone(&self.backend);
        let prevent_reload = Arc::clone(&self.prevent_reload);
        let cooldown = self.reload_cooldown;
        self.stop_task = Some(tokio::spawn(async move {
            if let Err(error) = backend.stop(&session_id).await {
                tracing::warn!(%session_id, %error, "best-effort stop failed");
            }
            tokio::time::sleep(cooldown).await;
            prevent_reload.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }

    /// Waits for the most recent best-effort backend stop to settle
    ///
    /// Local teardown never blocks on this; it exists so a caller that is
    /// about to exit the process can give the fire-and-forget stop a chance
    /// to reach the backend.
    pub async fn stop_settled(&mut self) {
        if let Some(task) = self.stop_task.take() {
            let _ = task.await;
        }
    }

    /// Adopts a backend-assigned replacement id for the live session
    ///
    /// A transparent identity change: the transcript survives, the URL is
    /// rewritten, and the state stays `Active`. Work still in flight for
    /// the old generation observes its revoked handle and drops out.
    fn rotate(&mut self, new_session_id: String) {
        if self.session_id().as_deref() == Some(new_session_id.as_str()) {
            return;
        }
        if let Some(old) = self.current.take() {
            tracing::info!(old = %old.id(), new = %new_session_id, "session id rotated");
            old.revoke();
        }

        let handle = SessionHandle::new(new_session_id);
        self.url.set_session_id(Some(handle.id()));
        self.chat.rebind(handle.clone());
        self.current = Some(handle);
    }

    /// Revokes and clears every view of the previous session
    fn teardown_views(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.revoke();
        }
        self.chat.clear();
        if let Ok(mut tree) = self.trace.lock() {
            tree.clear();
        }
        self.url.set_session_id(None);
        self.playbook.clear();
    }

    fn spawn_history_load(&self) {
        let chat = self.chat.clone();
        let backend = Arc::clone(&self.backend);
        let trace = Arc::clone(&self.trace);
        tokio::spawn(async move {
            chat.load_history(backend, trace).await;
        });
    }

    fn spawn_trace_load(&self, handle: SessionHandle) {
        let backend = Arc::clone(&self.backend);
        let trace = Arc::clone(&self.trace);
        tokio::spawn(async move {
            match backend.fetch_trace(handle.id()).await {
                Ok(nodes) => {
                    if handle.is_stopped() {
                        tracing::warn!(session_id = %handle.id(), "discarding stale trace load");
                        return;
                    }
                    if let Ok(mut tree) = trace.lock() {
                        tree.load(trace::session_root(handle.id(), nodes));
                    }
                }
                Err(error) => {
                    tracing::debug!(session_id = %handle.id(), %error, "trace fetch failed");
                }
            }
        });
    }
}
