//! Command handlers for the Playpen CLI
//!
//! Each submodule wires configuration into a backend client and a session
//! controller for one CLI command. The session logic itself lives in
//! [`crate::session`]; these handlers are chrome.

pub mod examples;
pub mod resume;
pub mod run;
pub mod special;
pub mod stop;
