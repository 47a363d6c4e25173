//! Playpen - console control plane for remote playbook execution sessions
//!
//! This library drives long-lived sessions on a remote playbook execution
//! service: it starts, resumes, shares, and stops them, exchanges chat
//! turns with the running session, and keeps the session's execution trace
//! mergeable and explorable.
//!
//! # Architecture
//!
//! - `session`: the lifecycle state machine, per-session guard handles, and
//!   the playground URL binding that makes sessions shareable
//! - `chat`: the transcript reconciler (history adoption, trace-derived
//!   fallback, optimistic sends with local recovery)
//! - `trace`: the execution trace tree and its idempotent merge
//! - `backend`: the request/response contract with the remote engine and
//!   its HTTP implementation
//! - `config`, `cli`, `commands`, `console`: configuration and terminal
//!   chrome
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use playpen::backend::HttpBackend;
//! use playpen::config::Config;
//! use playpen::session::SessionController;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let backend = Arc::new(HttpBackend::new(&config.backend)?);
//!     let mut controller = SessionController::new(backend, &config.playground.base_url)?;
//!     controller.start("# HelloWorld Agent\n...", None).await?;
//!     println!("share: {}", controller.share_url().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod playbook;
pub mod session;
pub mod trace;
pub mod transcript;

// Re-export commonly used types
pub use chat::{ChatReconciler, SendDisposition};
pub use config::Config;
pub use error::{PlaypenError, Result};
pub use session::{LifecycleState, PlaygroundUrl, SessionController, SessionHandle};
pub use trace::{AnchorPath, MergeOutcome, TraceNode, TraceTree};
pub use transcript::{ChatEntry, Role, Transcript};

#[cfg(test)]
pub mod test_utils;
