//! Stream directory events until Ctrl-C

use anyhow::{Context, Result};
use cli_lib::config::DaemonConfig;
use cli_lib::daemon::{self, OutputFormat, StreamOptions};
use cli_lib::util;
use dirwatch_core::LocalFileSystem;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use watcher::WatchEngine;

pub async fn run(
    config: &DaemonConfig,
    root: Option<PathBuf>,
    dirs: Vec<String>,
    json: bool,
    count: Option<usize>,
) -> Result<()> {
    let root = util::resolve_root(root, config)?;
    let fs = LocalFileSystem::new(&root)
        .with_context(|| format!("Cannot serve {}", root.display()))?;
    let engine = WatchEngine::with_config(Arc::new(fs), config.watcher.clone())
        .context("Failed to start the watch engine")?;

    let stdout = std::io::stdout();
    let format = if json {
        OutputFormat::Json
    } else if stdout.is_terminal() {
        OutputFormat::Color
    } else {
        OutputFormat::Plain
    };
    let options = StreamOptions {
        dirs: util::resolve_dirs(dirs, config),
        format,
        limit: count,
    };

    let shutdown = CancellationToken::new();
    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("received Ctrl-C"),
                Err(e) => warn!("cannot listen for Ctrl-C: {}", e),
            }
            shutdown.cancel();
        })
    };

    info!("serving {}", root.display());
    let mut out = stdout;
    let written = daemon::run(engine, &options, shutdown, &mut out).await;
    ctrl_c.abort();

    info!("{} events written", written?);
    Ok(())
}
