//! Test utilities for Playpen
//!
//! Provides a scripted in-memory execution backend plus temporary-file
//! helpers for configuration tests.

use crate::backend::{
    ExecutionBackend, HistoryMessage, MessageReply, SessionSnapshot, StartedSession,
};
use crate::error::{PlaypenError, Result};
use crate::trace::TraceNode;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// A scripted execution backend for deterministic tests
///
/// Builder methods script each call's answer; `with_delay` holds every call
/// for a beat so tests can interleave a stop with in-flight work. Cloning
/// shares the call counters, letting a test keep a handle for assertions
/// after moving a clone into the controller.
#[derive(Clone)]
pub struct FakeBackend {
    session_id: String,
    initial_message: Option<String>,
    start_fails: bool,
    reply: String,
    send_fails: bool,
    rotation: Option<String>,
    trace_fragment: Option<TraceNode>,
    trace_nodes: Vec<TraceNode>,
    history: Vec<HistoryMessage>,
    history_fails: bool,
    snapshot: Option<(String, Vec<TraceNode>, Option<Vec<HistoryMessage>>)>,
    resume_not_found: bool,
    resume_fails: bool,
    playbooks: BTreeMap<String, String>,
    delay: Duration,
    resume_calls: Arc<AtomicUsize>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            session_id: "fake-session".to_string(),
            initial_message: None,
            start_fails: false,
            reply: "ok".to_string(),
            send_fails: false,
            rotation: None,
            trace_fragment: None,
            trace_nodes: Vec::new(),
            history: Vec::new(),
            history_fails: false,
            snapshot: None,
            resume_not_found: false,
            resume_fails: false,
            playbooks: BTreeMap::new(),
            delay: Duration::ZERO,
            resume_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the id returned by `start`
    pub fn with_session_id(mut self, id: &str) -> Self {
        self.session_id = id.to_string();
        self
    }

    /// Scripts an opening message returned by `start`
    pub fn with_initial_message(mut self, text: &str) -> Self {
        self.initial_message = Some(text.to_string());
        self
    }

    /// Makes `start` fail with a transport error
    pub fn with_start_failure(mut self) -> Self {
        self.start_fails = true;
        self
    }

    /// Scripts the reply text for `send_message`
    pub fn with_reply(mut self, text: &str) -> Self {
        self.reply = text.to_string();
        self
    }

    /// Makes `send_message` fail with a transport error
    pub fn with_send_failure(mut self) -> Self {
        self.send_fails = true;
        self
    }

    /// Scripts a rotated session id on the next reply
    pub fn with_rotation(mut self, new_id: &str) -> Self {
        self.rotation = Some(new_id.to_string());
        self
    }

    /// Scripts a trace fragment delivered with the next reply
    pub fn with_trace_fragment(mut self, fragment: TraceNode) -> Self {
        self.trace_fragment = Some(fragment);
        self
    }

    /// Scripts the forest returned by `fetch_trace`
    pub fn with_trace_nodes(mut self, nodes: Vec<TraceNode>) -> Self {
        self.trace_nodes = nodes;
        self
    }

    /// Scripts the messages returned by `fetch_history`
    pub fn with_history(mut self, messages: Vec<HistoryMessage>) -> Self {
        self.history = messages;
        self
    }

    /// Makes `fetch_history` fail with a transport error
    pub fn with_history_failure(mut self) -> Self {
        self.history_fails = true;
        self
    }

    /// Scripts the snapshot returned by `resume`
    pub fn with_snapshot(
        mut self,
        playbook: &str,
        traces: Vec<TraceNode>,
        messages: Option<Vec<HistoryMessage>>,
    ) -> Self {
        self.snapshot = Some((playbook.to_string(), traces, messages));
        self
    }

    /// Makes `resume` report the session as unknown/expired
    pub fn with_resume_not_found(mut self) -> Self {
        self.resume_not_found = true;
        self
    }

    /// Makes `resume` fail with a transport error
    pub fn with_resume_failure(mut self) -> Self {
        self.resume_fails = true;
        self
    }

    /// Scripts the example playbook catalog
    pub fn with_playbooks(mut self, playbooks: BTreeMap<String, String>) -> Self {
        self.playbooks = playbooks;
        self
    }

    /// Holds every call for the given duration before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many times `resume` has been called
    pub fn resume_call_count(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    async fn start(
        &self,
        _playbook: &str,
        _existing_session_id: Option<&str>,
    ) -> Result<StartedSession> {
        self.pause().await;
        if self.start_fails {
            return Err(PlaypenError::Transport("scripted start failure".to_string()).into());
        }
        Ok(StartedSession {
            session_id: self.session_id.clone(),
            initial_message: self.initial_message.clone(),
        })
    }

    async fn resume(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.pause().await;
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if self.resume_fails {
            return Err(PlaypenError::Transport("scripted resume failure".to_string()).into());
        }
        if self.resume_not_found || self.snapshot.is_none() {
            return Err(PlaypenError::SessionNotFound(session_id.to_string()).into());
        }
        let (playbook, traces, messages) = self.snapshot.clone().expect("checked above");
        Ok(SessionSnapshot {
            playbook,
            traces,
            messages,
        })
    }

    async fn send_message(&self, _session_id: &str, _text: &str) -> Result<MessageReply> {
        self.pause().await;
        if self.send_fails {
            return Err(PlaypenError::Transport("scripted send failure".to_string()).into());
        }
        Ok(MessageReply {
            response: self.reply.clone(),
            trace_fragment: self.trace_fragment.clone(),
            new_session_id: self.rotation.clone(),
        })
    }

    async fn stop(&self, _session_id: &str) -> Result<()> {
        self.pause().await;
        Ok(())
    }

    async fn fetch_trace(&self, _session_id: &str) -> Result<Vec<TraceNode>> {
        self.pause().await;
        Ok(self.trace_nodes.clone())
    }

    async fn fetch_history(&self, _session_id: &str) -> Result<Vec<HistoryMessage>> {
        self.pause().await;
        if self.history_fails {
            return Err(PlaypenError::Transport("scripted history failure".to_string()).into());
        }
        Ok(self.history.clone())
    }

    async fn list_playbooks(&self) -> Result<BTreeMap<String, String>> {
        self.pause().await;
        Ok(self.playbooks.clone())
    }
}
