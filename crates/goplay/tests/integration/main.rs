//! Integration tests for goplay
//!
//! These tests require a Go toolchain and a built `goplay-runner`.
//! Run with: cargo build -p goplay-runner && cargo test -p goplay --features integration-tests
//!
//! `GOPLAY_TEST_GOROOT` points at the toolchain (default: /usr/local/go) and
//! `GOPLAY_TEST_RUNNER` at the runner binary (default: target/debug).
//!
//! Tests that require root are marked `#[ignore]`. To include them:
//!    cargo test -p goplay --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use futures_util::StreamExt;
use goplay::config::Config;
use goplay::{EventStream, OutputEvent, Variant};

mod config_loading;
mod isolation;
mod runner;
mod streaming;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const DEFAULT_RUNNER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../target/debug/goplay-runner");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

pub(crate) fn go_root() -> PathBuf {
    std::env::var_os("GOPLAY_TEST_GOROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/usr/local/go"))
}

pub(crate) fn runner_path() -> PathBuf {
    std::env::var_os("GOPLAY_TEST_RUNNER")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNNER))
}

/// Single-variant config rooted in a private workspace directory
pub(crate) fn test_config(workspace_root: PathBuf) -> Config {
    let cache = workspace_root.join(".cache");
    let variant = Variant {
        name: "test".into(),
        root: go_root(),
        go_version: "1.22".into(),
        resolve_dependencies: false,
        env: [("GOCACHE".to_owned(), cache.display().to_string())].into(),
    };
    let mut config = Config::with_variant("1", variant);
    config.workspace_root = workspace_root;
    config.runner_path = Some(runner_path());
    config.request_timeout = 60.0;
    config
}

/// Collect a whole event stream
pub(crate) async fn collect(stream: EventStream) -> Vec<OutputEvent> {
    tokio::time::timeout(Duration::from_secs(120), stream.collect::<Vec<_>>())
        .await
        .expect("event stream did not finish")
}

/// Give this process the toolchain environment the orchestrator would pass
/// to the runner
///
/// Runs once; every test shares one build cache.
pub(crate) fn init_toolchain_env(variant: &Variant) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let home = std::env::temp_dir().join("goplay-integration");
        fs::create_dir_all(&home).expect("Failed to create toolchain home");
        for (key, value) in variant.environment(&home) {
            if key == "GOCACHE" {
                continue;
            }
            // SAFETY: runs once, before any test spawns a child
            unsafe { std::env::set_var(key, value) };
        }
        // SAFETY: as above
        unsafe { std::env::set_var("GOCACHE", home.join("go-build")) };
    });
}
