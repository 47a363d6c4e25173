//! Command-line interface definition for Playpen
//!
//! Defines the CLI structure using clap's derive API, providing commands
//! for running, resuming, stopping, and browsing playbook sessions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Playpen - console for remote playbook execution sessions
///
/// Run a playbook against the execution service, chat with the running
/// session, and share or resume it via its playground URL.
#[derive(Parser, Debug, Clone)]
#[command(name = "playpen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the execution backend base URL
    #[arg(long, env = "PLAYPEN_API_BASE")]
    pub api_base: Option<String>,

    /// Override the playground base URL used for share links
    #[arg(long, env = "PLAYPEN_PLAYGROUND_URL")]
    pub playground_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Playpen
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a playbook session and chat with it
    Run {
        /// Path to a playbook markdown file (built-in HelloWorld when omitted)
        playbook: Option<PathBuf>,

        /// Ask the backend to reuse an existing session id
        #[arg(long)]
        session: Option<String>,
    },

    /// Attach to an existing session from a share URL or bare id
    Resume {
        /// Playground URL carrying a session_id, or the id itself
        target: String,
    },

    /// Stop a session without attaching to it (best-effort)
    Stop {
        /// Playground URL carrying a session_id, or the id itself
        target: String,
    },

    /// List the backend's example playbook catalog
    Examples,
}

impl Cli {
    /// Parses command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_playbook() {
        let cli = Cli::parse_from(["playpen", "run", "hello.md"]);
        match cli.command {
            Commands::Run { playbook, session } => {
                assert_eq!(playbook, Some(PathBuf::from("hello.md")));
                assert!(session.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_with_session_reuse() {
        let cli = Cli::parse_from(["playpen", "run", "hello.md", "--session", "abc123"]);
        match cli.command {
            Commands::Run { session, .. } => assert_eq!(session, Some("abc123".to_string())),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_resume_target() {
        let cli = Cli::parse_from([
            "playpen",
            "resume",
            "http://localhost:3000/playground?session_id=abc123",
        ]);
        match cli.command {
            Commands::Resume { target } => assert!(target.contains("abc123")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::parse_from([
            "playpen",
            "--api-base",
            "http://127.0.0.1:9999",
            "--verbose",
            "examples",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.api_base, Some("http://127.0.0.1:9999".to_string()));
        assert!(matches!(cli.command, Commands::Examples));
    }
}
