//! Playpen - console for remote playbook execution sessions
//!
//! Main entry point: initializes tracing, loads configuration, and
//! dispatches to the command handlers.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use playpen::cli::{Cli, Commands};
use playpen::commands;
use playpen::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Run { playbook, session } => {
            tracing::info!("starting playbook run");
            commands::run::run(config, playbook, session).await
        }
        Commands::Resume { target } => {
            tracing::info!("resuming session");
            commands::resume::resume(config, target).await
        }
        Commands::Stop { target } => commands::stop::stop(config, target).await,
        Commands::Examples => commands::examples::examples(config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "playpen=debug" } else { "playpen=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
