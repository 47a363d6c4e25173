//! Interactive console loop
//!
//! Thin chrome over the session controller: a rustyline read loop where
//! plain lines are chat turns and `/`-prefixed lines are console commands.
//! All session logic stays in [`crate::session`].

use crate::commands::special::ConsoleCommand;
use crate::error::Result;
use crate::session::SessionController;
use crate::trace::{TraceNode, TraceTree};
use crate::transcript::{ChatEntry, Role};

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Runs the interactive loop until the user stops or leaves the session
pub async fn interact(mut controller: SessionController) -> Result<()> {
    println!(
        "{}",
        "Type a message to chat, or /help for commands.".dimmed()
    );

    let mut editor = DefaultEditor::new()?;
    let mut rendered = print_new_entries(&controller, 0);

    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                if line.starts_with('/') {
                    match ConsoleCommand::parse(&line) {
                        Ok(ConsoleCommand::Trace) => {
                            let trace = controller.trace();
                            let output = trace
                                .lock()
                                .map(|tree| render_tree(&tree))
                                .unwrap_or_default();
                            if output.is_empty() {
                                println!("{}", "No trace data available.".yellow());
                            } else {
                                print!("{output}");
                            }
                        }
                        Ok(ConsoleCommand::Share) => match controller.share_url() {
                            Some(url) => println!("{url}"),
                            None => println!("{}", "No active session to share.".yellow()),
                        },
                        Ok(ConsoleCommand::Status) => {
                            let id = controller.session_id().unwrap_or_else(|| "-".to_string());
                            println!("{} {}  {} {}", "state:".dimmed(), controller.state(), "session:".dimmed(), id);
                        }
                        Ok(ConsoleCommand::Stop) => {
                            controller.stop()?;
                            println!("{}", "Session stopped.".yellow());
                            // The process is about to exit; give the
                            // best-effort backend stop a chance to land.
                            controller.stop_settled().await;
                            break;
                        }
                        Ok(ConsoleCommand::Help) => println!("{}", ConsoleCommand::help_text()),
                        Ok(ConsoleCommand::Quit) => {
                            print_resume_hint(&controller);
                            break;
                        }
                        Err(error) => println!("{}", error.to_string().red()),
                    }
                } else {
                    if let Err(error) = controller.send(&line).await {
                        println!("{}", error.to_string().red());
                    }
                    rendered = print_new_entries(&controller, rendered);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                print_resume_hint(&controller);
                break;
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}

fn print_resume_hint(controller: &SessionController) {
    if let Some(url) = controller.share_url() {
        println!(
            "{} {}",
            "Session left running. Resume with:".dimmed(),
            url
        );
    }
}

/// Prints transcript entries appended since the last render
///
/// Returns the new high-water mark.
fn print_new_entries(controller: &SessionController, from: usize) -> usize {
    let entries = controller.chat().entries();
    for entry in entries.iter().skip(from) {
        println!("{}", render_entry(entry));
    }
    entries.len()
}

fn render_entry(entry: &ChatEntry) -> String {
    match entry.role {
        Role::User => format!("{} {}", "you>".cyan().bold(), entry.content),
        Role::Assistant => format!("{} {}", "agent>".green().bold(), entry.content),
    }
}

/// Renders the trace tree with two-space indentation per level
///
/// Shows each node's name (falling back to its id), its kind, and the
/// status and duration metadata when present.
fn render_tree(tree: &TraceTree) -> String {
    let mut out = String::new();
    if let Some(root) = tree.root() {
        render_node(root, 0, &mut out);
    }
    out
}

fn render_node(node: &TraceNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let label = if node.name.is_empty() {
        node.id.as_str()
    } else {
        node.name.as_str()
    };

    let mut line = format!("{indent}{} {}", label.bold(), format!("[{}]", node.node_type).dimmed());
    if let Some(status) = node.metadata_str("status") {
        line.push_str(&format!(" {}", colorize_status(status)));
    }
    if let Some(duration) = node.metadata_str("duration") {
        line.push_str(&format!(" {}", duration.dimmed()));
    }
    out.push_str(&line);
    out.push('\n');

    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

fn colorize_status(status: &str) -> String {
    match status {
        "completed" | "success" => status.green().to_string(),
        "failed" | "error" => status.red().to_string(),
        "running" | "in_progress" => status.yellow().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_entry_tags_roles() {
        plain();
        let user = render_entry(&ChatEntry::user("hello"));
        assert!(user.starts_with("you>"));
        assert!(user.contains("hello"));

        let agent = render_entry(&ChatEntry::assistant("hi"));
        assert!(agent.starts_with("agent>"));
    }

    #[test]
    fn test_render_tree_indents_by_depth() {
        plain();
        let mut tree = TraceTree::new();
        tree.load(
            TraceNode::new("root", "Session", "agent").with_children(vec![TraceNode::new(
                "sec-1", "Main", "section",
            )
            .with_children(vec![
                TraceNode::new("step-1", "Greet", "step")
                    .with_metadata("status", json!("completed"))
                    .with_metadata("duration", json!("120ms")),
            ])]),
        );

        let output = render_tree(&tree);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Session"));
        assert!(lines[1].starts_with("  Main"));
        assert!(lines[2].starts_with("    Greet"));
        assert!(lines[2].contains("completed"));
        assert!(lines[2].contains("120ms"));
    }

    #[test]
    fn test_render_tree_falls_back_to_id() {
        plain();
        let mut tree = TraceTree::new();
        tree.load(TraceNode::new("node-7", "", "step"));
        assert!(render_tree(&tree).contains("node-7"));
    }

    #[test]
    fn test_render_empty_tree() {
        assert_eq!(render_tree(&TraceTree::new()), "");
    }
}
