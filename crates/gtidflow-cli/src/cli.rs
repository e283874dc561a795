use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gtidflow")]
#[command(about = "Stream MySQL row changes to NSQ with durable GTID checkpoints")]
#[command(version)]
pub struct Cli {
    /// Path to gtidflow.toml config file
    #[arg(short, long, global = true, default_value = "gtidflow.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sample gtidflow.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Start streaming changes to NSQ
    Run,

    /// Show the stored checkpoint and how far behind the server it is
    Status,

    /// Export table metadata as a JSON snapshot
    Schema {
        /// Write the snapshot to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["gtidflow", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.config, PathBuf::from("gtidflow.toml"));

        let cli = Cli::try_parse_from(["gtidflow", "schema", "-o", "schema.json", "-c", "a.toml"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("a.toml"));
        assert!(matches!(
            cli.command,
            Commands::Schema { output: Some(ref p) } if p == &PathBuf::from("schema.json")
        ));
    }
}
