//! Session lifecycle layer
//!
//! Owns the "which session is active" question: the lifecycle state
//! machine, the per-generation guard handles that let late async results be
//! discarded, and the playground URL binding that makes a session
//! shareable and resumable.

pub mod controller;
pub mod guard;
pub mod url_state;

pub use controller::{LifecycleState, SessionController};
pub use guard::SessionHandle;
pub use url_state::{parse_session_ref, PlaygroundUrl, SESSION_QUERY_PARAM};
