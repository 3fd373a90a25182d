//! Dirwatch CLI - dirwatch command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Dirwatch - stream file and directory changes from a served tree
#[derive(Parser)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/dirwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream events for directories until Ctrl-C
    Watch {
        /// Directory served as "/" (default: config root, then cwd)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,

        /// Exit after this many events, acknowledgments included
        #[arg(long)]
        count: Option<usize>,

        /// Directories relative to the root, e.g. /docs (default: config
        /// watch list, then /)
        dirs: Vec<String>,
    },
    /// List a directory the way the engine sees it
    Ls {
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        #[arg(default_value = "/")]
        dir: String,
    },
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Print an example config file
    Example,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli_lib::config::load(cli.config.as_deref())?;
    let _log_guard = cli_lib::logging::init(&config.log)?;

    match cli.command {
        Commands::Watch {
            root,
            json,
            count,
            dirs,
        } => cmd::watch::run(&config, root, dirs, json, count).await,
        Commands::Ls { root, json, dir } => cmd::ls::run(&config, root, &dir, json).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Path => cmd::config::run_path().await,
            ConfigCommands::Example => cmd::config::run_example().await,
            ConfigCommands::Show => cmd::config::run_show(&config).await,
        },
    }
}
