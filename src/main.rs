// src/main.rs

use anyhow::Result;
use bundleforge::commands;
use bundleforge::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundleforge")]
#[command(author, version, about = "Asset-bundle replacement engine for game mod packaging", long_about = None)]
struct Cli {
    /// Configuration file (default: ./bundleforge.toml, falling back to
    /// built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack one workspace: detect changes, fetch sources, inject
    /// replacements and assemble the output tree
    Pack {
        /// Workspace name under the configured workspace root
        workspace: String,
    },
    /// Show what a pack run would do, without touching anything
    Status {
        /// Workspace name under the configured workspace root
        workspace: String,
    },
    /// List workspaces and their mod directories
    Workspaces,
    /// Decode a container file and print its entry table
    Inspect {
        /// Path to a container file
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    match run() {
        Ok(clean) if clean => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Pack { workspace } => Ok(commands::cmd_pack(&workspace, config)?),
        Commands::Status { workspace } => {
            commands::cmd_status(&workspace, config)?;
            Ok(true)
        }
        Commands::Workspaces => {
            commands::cmd_workspaces(config)?;
            Ok(true)
        }
        Commands::Inspect { path } => {
            commands::cmd_inspect(&path)?;
            Ok(true)
        }
    }
}
