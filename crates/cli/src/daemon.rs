//! Event streaming loop
//!
//! Registers one listener on each requested directory and prints what it
//! hears until cancelled. Events arrive on the engine's polling thread and
//! cross into the async side through an unbounded channel.

use anyhow::{Context, Result};
use dirwatch_core::path::join;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watcher::{DirectoryEvent, DirectoryEventListener, WatchEngine};

/// One event as printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLine {
    pub event: DirectoryEvent,
    pub dir: String,
    pub name: String,
    pub modified_at: u64,
}

impl EventLine {
    /// Virtual path of the affected entry
    pub fn path(&self) -> String {
        match self.event {
            DirectoryEvent::WatchingDirectory => self.dir.clone(),
            _ => join(&self.dir, &self.name),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Json => serde_json::to_string(self)?,
            OutputFormat::Plain => format!("{:<18} {}", self.event.to_string(), self.path()),
            OutputFormat::Color => {
                let label = format!("{:<18}", self.event.to_string());
                let label = match self.event {
                    DirectoryEvent::WatchingDirectory => label.dimmed().to_string(),
                    DirectoryEvent::FileAdded | DirectoryEvent::DirectoryAdded => {
                        label.green().to_string()
                    }
                    DirectoryEvent::FileRemoved | DirectoryEvent::DirectoryRemoved => {
                        label.red().to_string()
                    }
                };
                format!("{} {}", label, self.path().cyan())
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Color,
    /// One JSON object per line
    Json,
}

/// Forwards notifications into a tokio channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<EventLine>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EventLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl DirectoryEventListener for ChannelListener {
    fn notify(&self, event: DirectoryEvent, containing_dir: &str, entry_name: &str, modified_at: u64) {
        let line = EventLine {
            event,
            dir: containing_dir.to_string(),
            name: entry_name.to_string(),
            modified_at,
        };
        if self.tx.send(line).is_err() {
            debug!("event receiver closed, dropping {} in {}", event, containing_dir);
        }
    }
}

/// What a streaming session should do
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub dirs: Vec<String>,
    pub format: OutputFormat,
    /// Stop after this many events, acknowledgments included
    pub limit: Option<usize>,
}

/// Stream events for `options.dirs` into `out` until `shutdown` fires, the
/// limit is reached, or the channel closes
///
/// Returns the number of events written. The engine is torn down before
/// returning, on success and on error alike.
pub async fn run<W: Write>(
    engine: WatchEngine,
    options: &StreamOptions,
    shutdown: CancellationToken,
    out: &mut W,
) -> Result<usize> {
    let (listener, mut rx) = ChannelListener::new();
    let listener: Arc<dyn DirectoryEventListener> = listener;

    let outcome = stream(&engine, &listener, &mut rx, options, &shutdown, out).await;

    for dir in &options.dirs {
        engine.stop_watching(dir, &listener);
    }
    if let Some(failure) = engine.take_worker_failure() {
        warn!("polling thread failed: {}", failure);
    }

    // Joins the polling thread
    tokio::task::spawn_blocking(move || drop(engine))
        .await
        .context("Engine teardown panicked")?;

    outcome
}

async fn stream<W: Write>(
    engine: &WatchEngine,
    listener: &Arc<dyn DirectoryEventListener>,
    rx: &mut mpsc::UnboundedReceiver<EventLine>,
    options: &StreamOptions,
    shutdown: &CancellationToken,
    out: &mut W,
) -> Result<usize> {
    for dir in &options.dirs {
        engine
            .watch(dir, listener)
            .with_context(|| format!("Failed to watch {}", dir))?;
    }
    info!("streaming events for {} directories", options.dirs.len());

    let mut written = 0;
    loop {
        if options.limit.is_some_and(|limit| written >= limit) {
            return Ok(written);
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested");
                return Ok(written);
            }
            line = rx.recv() => {
                let Some(line) = line else {
                    warn!("event channel closed");
                    return Ok(written);
                };
                let rendered = line.render(options.format)?;
                writeln!(out, "{}", rendered)
                    .and_then(|_| out.flush())
                    .context("Failed to write event")?;
                written += 1;
            }
        }
    }
}
