//! Common test utilities for featurelens integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/featurelens/` directory, plus a tiny HTTP
//! server for endpoint probes.

#![allow(dead_code)]

use assert_cmd::Command;
use std::io::{Read, Write};
use std::net::TcpListener;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// The `fl()` method returns a `Command` that sets `FL_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a test environment with the given config.kdl.
    pub fn with_config(config: &str) -> Self {
        let env = Self::new();
        env.write_config(config);
        env
    }

    /// Get a Command for the fl binary with isolated data directory.
    pub fn fl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_fl"));
        cmd.env("FL_DATA_DIR", self.data_dir.path());
        cmd.env_remove("FL_CONFIG");
        cmd.env_remove("FL_BASE_URL");
        cmd.env_remove("FL_TEST_TIMEOUT_MS");
        cmd
    }

    /// Run `fl` with args, assert success, and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.fl().args(args).assert().success().get_output().clone();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    pub fn write_config(&self, config: &str) {
        std::fs::write(self.data_path().join("config.kdl"), config).unwrap();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `requests` HTTP requests with a fixed status, then stop.
///
/// Returns the base URL (e.g. `http://127.0.0.1:PORT`).
pub fn serve(status: u16, body: &'static str, requests: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming().take(requests) {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
