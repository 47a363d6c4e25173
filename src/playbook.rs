//! Playbook source helpers
//!
//! A playbook is a markdown program; its first H1 heading names it.

use regex::Regex;

/// Fallback display name when a playbook has no H1 heading
pub const UNTITLED_PLAYBOOK: &str = "My Playbook";

/// Built-in starter playbook used when no file is supplied
pub const DEFAULT_PLAYBOOK: &str = r#"# HelloWorld Agent
This is a simple Hello World agent.

## HelloWorld

### Trigger
At the beginning

### Steps
- Greet the user with a friendly "Hello, World!" message.
- Explain that this is a demonstration of a simple Hello World playbook.
- Say goodbye to the user.
"#;

/// Extracts the playbook's display name from its first H1 heading
///
/// # Examples
///
/// ```
/// use playpen::playbook;
///
/// assert_eq!(playbook::title("# Greeter\nbody"), "Greeter");
/// assert_eq!(playbook::title("no heading here"), "My Playbook");
/// ```
pub fn title(source: &str) -> String {
    let h1 = Regex::new(r"(?m)^#\s+(.+)$").expect("static pattern");
    h1.captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| UNTITLED_PLAYBOOK.to_string())
}
