//! Special commands parser for the interactive console
//!
//! Special commands are `/`-prefixed, case-insensitive lines entered during
//! an interactive session. They act on the session rather than being sent
//! to the engine.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),
}

/// Special commands that can be executed during an interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Render the current execution trace tree
    Trace,

    /// Print the shareable playground URL for the session
    Share,

    /// Show the lifecycle state and bound session id
    Status,

    /// Stop the session and leave the console
    Stop,

    /// Display help information
    Help,

    /// Leave the console without stopping the session
    Quit,
}

impl ConsoleCommand {
    /// Parses a `/`-prefixed console line
    ///
    /// # Examples
    ///
    /// ```
    /// use playpen::commands::special::ConsoleCommand;
    ///
    /// assert_eq!(ConsoleCommand::parse("/trace"), Ok(ConsoleCommand::Trace));
    /// assert_eq!(ConsoleCommand::parse("/QUIT"), Ok(ConsoleCommand::Quit));
    /// assert!(ConsoleCommand::parse("/bogus").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let trimmed = input.trim().trim_start_matches('/').to_lowercase();
        match trimmed.as_str() {
            "trace" => Ok(Self::Trace),
            "share" => Ok(Self::Share),
            "status" => Ok(Self::Status),
            "stop" => Ok(Self::Stop),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            _ => Err(CommandError::UnknownCommand(input.trim().to_string())),
        }
    }

    /// Help text listing every special command
    pub fn help_text() -> &'static str {
        "Available commands:\n\
         /trace   Render the execution trace tree\n\
         /share   Print the shareable session URL\n\
         /status  Show session state and id\n\
         /stop    Stop the session and exit\n\
         /help    Show this help\n\
         /quit    Exit, leaving the session running"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(ConsoleCommand::parse("/trace"), Ok(ConsoleCommand::Trace));
        assert_eq!(ConsoleCommand::parse("/share"), Ok(ConsoleCommand::Share));
        assert_eq!(ConsoleCommand::parse("/status"), Ok(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("/stop"), Ok(ConsoleCommand::Stop));
        assert_eq!(ConsoleCommand::parse("/help"), Ok(ConsoleCommand::Help));
        assert_eq!(ConsoleCommand::parse("/quit"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ConsoleCommand::parse("/TRACE"), Ok(ConsoleCommand::Trace));
        assert_eq!(ConsoleCommand::parse("/Share"), Ok(ConsoleCommand::Share));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ConsoleCommand::parse("/exit"), Ok(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("/q"), Ok(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("/?"), Ok(ConsoleCommand::Help));
    }

    #[test]
    fn test_parse_unknown_command() {
        let error = ConsoleCommand::parse("/bogus").unwrap_err();
        assert!(matches!(error, CommandError::UnknownCommand(_)));
        assert!(error.to_string().contains("/bogus"));
    }

    #[test]
    fn test_help_text_lists_all_commands() {
        let help = ConsoleCommand::help_text();
        for command in ["/trace", "/share", "/status", "/stop", "/help", "/quit"] {
            assert!(help.contains(command), "help should mention {command}");
        }
    }
}
