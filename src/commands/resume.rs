//! `playpen resume` - attach to an existing session

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::console;
use crate::error::{PlaypenError, Result};
use crate::playbook;
use crate::session::{parse_session_ref, SessionController};

use colored::Colorize;
use std::sync::Arc;

/// Resumes a session named by a share URL or a bare session id
pub async fn resume(config: Config, target: String) -> Result<()> {
    let Some(session_id) = parse_session_ref(&target) else {
        return Err(PlaypenError::InvalidUrl(format!(
            "no session id found in '{target}'"
        ))
        .into());
    };

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let mut controller = SessionController::new(backend, &config.playground.base_url)?;
    controller.bind_url_session(&session_id);

    if !controller.attach().await? {
        println!(
            "{}",
            "Session not found or expired. Run the playbook again to start fresh.".yellow()
        );
        return Ok(());
    }

    println!(
        "{} {}",
        "Resumed".green().bold(),
        playbook::title(controller.playbook()).bold()
    );
    if let Some(url) = controller.share_url() {
        println!("{} {}", "Share:".dimmed(), url);
    }

    console::interact(controller).await
}
