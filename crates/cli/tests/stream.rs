//! Streaming loop against a fake kernel queue

#![cfg(target_os = "linux")]

use cli_lib::daemon::{self, OutputFormat, StreamOptions};
use dirwatch_core::MemoryFileSystem;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use watcher::testing::FakeKernel;
use watcher::{WatchEngine, WatcherConfig};

fn engine() -> (Arc<MemoryFileSystem>, FakeKernel, WatchEngine) {
    let fs = Arc::new(MemoryFileSystem::new("/host"));
    fs.add_dir("/", "docs", 1).unwrap();
    let kernel = FakeKernel::new();
    let engine = WatchEngine::with_kernel(
        fs.clone(),
        Box::new(kernel.clone()),
        WatcherConfig::default(),
    )
    .unwrap();
    (fs, kernel, engine)
}

fn options(limit: Option<usize>) -> StreamOptions {
    StreamOptions {
        dirs: vec!["/docs".to_string()],
        format: OutputFormat::Json,
        limit,
    }
}

#[tokio::test]
async fn test_streams_until_limit() {
    let (fs, kernel, engine) = engine();
    fs.add_file("/docs", "a.txt", 10, "hi").unwrap();

    let injector = {
        let kernel = kernel.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !kernel.push_created(Path::new("/host/docs"), "a.txt") {
                assert!(Instant::now() < deadline, "watch never registered");
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let mut out = Vec::new();
    let written = daemon::run(engine, &options(Some(2)), CancellationToken::new(), &mut out)
        .await
        .unwrap();
    injector.join().unwrap();

    assert_eq!(written, 2);
    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["event"], "watching_directory");
    assert_eq!(lines[1]["event"], "file_added");
    assert_eq!(lines[1]["name"], "a.txt");
    assert_eq!(lines[1]["modified_at"], 10);

    assert_eq!(kernel.active_watches(), 0);
    assert_eq!(kernel.close_count(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_stream() {
    let (_fs, kernel, engine) = engine();
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });
    }

    let mut out = Vec::new();
    let written = tokio::time::timeout(
        Duration::from_secs(5),
        daemon::run(engine, &options(None), shutdown, &mut out),
    )
    .await
    .expect("stream did not stop")
    .unwrap();

    assert_eq!(written, 1);
    assert_eq!(kernel.close_count(), 1);
}

#[tokio::test]
async fn test_watch_failure_is_reported() {
    let (_fs, kernel, engine) = engine();
    let options = StreamOptions {
        dirs: vec!["/missing".to_string()],
        format: OutputFormat::Plain,
        limit: None,
    };

    let mut out = Vec::new();
    let err = daemon::run(engine, &options, CancellationToken::new(), &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("/missing"));
    assert_eq!(kernel.close_count(), 1);
}

#[tokio::test]
async fn test_later_watch_failure_releases_earlier_watches() {
    let (_fs, kernel, engine) = engine();
    let options = StreamOptions {
        dirs: vec!["/docs".to_string(), "/missing".to_string()],
        format: OutputFormat::Plain,
        limit: None,
    };

    let mut out = Vec::new();
    let err = daemon::run(engine, &options, CancellationToken::new(), &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("/missing"));
    assert!(out.is_empty());
    assert_eq!(kernel.watches().len(), 1);
    assert_eq!(kernel.active_watches(), 0);
    assert_eq!(kernel.close_count(), 1);
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_write_failure_still_tears_down() {
    let (_fs, kernel, engine) = engine();

    let err = daemon::run(engine, &options(None), CancellationToken::new(), &mut BrokenPipe)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to write event"));
    assert_eq!(kernel.active_watches(), 0);
    assert_eq!(kernel.close_count(), 1);
}
