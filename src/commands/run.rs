//! `playpen run` - start a playbook session and chat with it

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::console;
use crate::error::Result;
use crate::playbook;
use crate::session::SessionController;

use anyhow::Context;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Starts a session from a playbook file (or the built-in default) and
/// enters the interactive console
pub async fn run(
    config: Config,
    playbook_path: Option<PathBuf>,
    session: Option<String>,
) -> Result<()> {
    let source = match &playbook_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read playbook {}", path.display()))?,
        None => playbook::DEFAULT_PLAYBOOK.to_string(),
    };

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let mut controller = SessionController::new(backend, &config.playground.base_url)?;

    println!(
        "{} {}",
        "Running".green().bold(),
        playbook::title(&source).bold()
    );

    controller.start(&source, session.as_deref()).await?;

    if let Some(url) = controller.share_url() {
        println!("{} {}", "Share:".dimmed(), url);
    }

    console::interact(controller).await
}
