//! End-to-end tests of the `dirwatch` binary

mod common;

use common::Dirwatch;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_example_is_valid() {
    let dirwatch = Dirwatch::new();
    let example = dirwatch.stdout(&["config", "example"]);
    let config = cli_lib::config::parse(&example).unwrap();
    assert_eq!(config.watch, vec!["/".to_string()]);
}

#[test]
fn test_config_path_and_show() {
    let dirwatch = Dirwatch::new();
    let path = dirwatch.stdout(&["config", "path"]);
    assert!(path.starts_with(&dirwatch.config_home().display().to_string()));
    assert!(path.contains("dirwatch/config.toml"));

    let config_dir = dirwatch.config_home().join("dirwatch");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "watch = [\"/docs\"]\n").unwrap();
    let shown = dirwatch.stdout(&["config", "show"]);
    assert!(shown.contains("/docs"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dirwatch = Dirwatch::new();
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("bad.toml");
    fs::write(&file, "[log]\nlevel = \"chatty\"\n").unwrap();

    let output = dirwatch.run(&["--config", file.to_str().unwrap(), "config", "show"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chatty"));
}

#[test]
fn test_ls_json() {
    let dirwatch = Dirwatch::new();
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    fs::write(tmp.path().join("file.txt"), b"abc").unwrap();

    let out = dirwatch.stdout(&["ls", "--root", tmp.path().to_str().unwrap(), "--json", "/"]);
    let entries: serde_json::Value = serde_json::from_str(&out).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "file.txt");
    assert_eq!(entries[0]["size"], 3);
    assert_eq!(entries[1]["name"], "sub");
    assert_eq!(entries[1]["is_dir"], true);
}

#[test]
fn test_watch_prints_acknowledgment() {
    let dirwatch = Dirwatch::new();
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("docs")).unwrap();

    let out = dirwatch.stdout(&[
        "watch",
        "--root",
        tmp.path().to_str().unwrap(),
        "--json",
        "--count",
        "1",
        "/docs",
    ]);
    let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(line["event"], "watching_directory");
    assert_eq!(line["dir"], "/docs");
    assert_eq!(line["name"], ".");
}

#[test]
fn test_watch_missing_directory_fails() {
    let dirwatch = Dirwatch::new();
    let tmp = TempDir::new().unwrap();

    let output = dirwatch.run(&["watch", "--root", tmp.path().to_str().unwrap(), "/nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nope"));
}
