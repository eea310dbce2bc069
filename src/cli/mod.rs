//! CLI module for Runbridge
//!
//! - `serve`: Run the controller against an in-memory store
//! - `validate`: Check `Run` manifests against the accepted grammar
//! - `translate`: Print the `BuildRun` each `Run` manifest would produce

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod manifest;

/// Runbridge CLI
#[derive(Parser, Debug)]
#[command(name = "runbridge")]
#[command(about = "Runs orchestrator Run invocations as native BuildRun executions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the controller
    Serve {
        /// Directory of manifests to seed the store with
        #[arg(long)]
        manifests: Option<PathBuf>,
    },
    /// Validate Run manifests
    Validate {
        /// YAML or JSON manifest file
        file: PathBuf,
    },
    /// Print the BuildRun each Run manifest translates to
    Translate {
        /// YAML or JSON manifest file
        file: PathBuf,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve { manifests }) => crate::server::run(manifests).await,
        Some(Commands::Validate { file }) => manifest::validate_file(&file),
        Some(Commands::Translate { file }) => manifest::translate_file(&file),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["runbridge", "serve", "--manifests", "deploy/manifests"]);
        match cli.command {
            Some(Commands::Serve { manifests }) => {
                assert_eq!(manifests, Some(PathBuf::from("deploy/manifests")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::parse_from(["runbridge", "validate", "run.yaml"]);
        assert!(matches!(cli.command, Some(Commands::Validate { file }) if file == PathBuf::from("run.yaml")));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["runbridge"]);
        assert!(cli.command.is_none());
    }
}
