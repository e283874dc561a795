use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod commands;
mod logging;
mod runner;
mod shutdown;

use cli::{Cli, Commands};
use gtidflow_config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        logging::init_default();
        return commands::cmd_init(path);
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config file: {}", cli.config.display()))?;
    // Held until exit so the file writer flushes.
    let _log_guard = logging::init(&config.log)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Run => commands::cmd_run(config).await,
        Commands::Status => commands::cmd_status(config).await,
        Commands::Schema { output } => commands::cmd_schema(config, output.as_deref()).await,
    }
}
