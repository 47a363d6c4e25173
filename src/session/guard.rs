//! Per-session guard handles
//!
//! Every live session generation gets one shared stop flag. Async work
//! captures a handle when it is issued and checks it again before applying
//! results; a handle revoked in the meantime turns the late result into a
//! silent no-op instead of UI corruption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A session id paired with its generation's stop flag
///
/// Cloning is cheap and shares the flag: revoking any clone revokes all of
/// them. A new generation (fresh start, or id rotation) gets a new handle;
/// outstanding work holding the old one observes the revocation.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    stopped: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Creates a live handle for a newly bound session id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The bound session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Marks this generation as stopped or superseded
    pub fn revoke(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once the generation has been stopped or superseded
    ///
    /// Checked before every state-updating step of in-flight async work.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
