//! `playpen examples` - list the backend's example playbook catalog

use crate::backend::{ExecutionBackend, HttpBackend};
use crate::config::Config;
use crate::error::Result;

use colored::Colorize;

/// Prints every example playbook the backend offers, keyed by title
pub async fn examples(config: Config) -> Result<()> {
    let backend = HttpBackend::new(&config.backend)?;
    let catalog = backend.list_playbooks().await?;

    if catalog.is_empty() {
        println!("No example playbooks available.");
        return Ok(());
    }

    for (name, source) in &catalog {
        let lines = source.lines().count();
        println!("{}  {}", name.bold(), format!("({lines} lines)").dimmed());
    }
    Ok(())
}
