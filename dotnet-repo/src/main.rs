//! `dotnet-repo`: scaffold .NET project repositories.
//!
//! Locates `dotnet` and `git` on `PATH` once, loads the optional
//! `dotnet-repo.toml`, and dispatches the subcommand.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use dotnet_repo::exit_codes;
use dotnet_repo::io::config::{DEFAULT_CONFIG_FILE, load_config};
use dotnet_repo::io::tool::ToolLocator;
use dotnet_repo::logging;
use dotnet_repo::new_repo::{NewOptions, Services, create_repository};

#[derive(Parser)]
#[command(
    name = "dotnet-repo",
    version,
    about = "Scaffold .NET project repositories",
    arg_required_else_help = true
)]
struct Cli {
    /// Log every external command's output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./dotnet-repo.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new repository with a solution, a first project and build modules.
    New {
        /// Name of the solution and its first project.
        name: String,

        /// Version control system to initialize (`git` or `none`).
        #[arg(long)]
        vcs: Option<String>,

        /// Repository root (default: ./<NAME>).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        error!("{err:#}");
        process::exit(exit_codes::FAILURE);
    }
    process::exit(exit_codes::OK);
}

fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().context("resolve current directory")?;
    let config_path = cli
        .config
        .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;

    match cli.command {
        Command::New { name, vcs, path } => {
            let services = Services::new(config, &ToolLocator::from_env())?;
            let options = NewOptions { name, vcs, path };
            create_repository(&services, &options, &cwd)?;
            Ok(())
        }
    }
}
