//! Shared integration-test harness for spawning `trafficlight` as a child
//! process and driving its console session over stdin/stdout.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Default timeout for a single expected output line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `trafficlight run` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct TrafficLightProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    seen: Vec<String>,
}

impl TrafficLightProcess {
    /// Spawns `trafficlight run --dry-run --quiet` with extra arguments.
    pub fn spawn_run(extra: &[&str]) -> Self {
        let mut child = Command::new(Self::bin())
            .args(["run", "--dry-run", "--quiet"])
            .args(extra)
            .env_remove("TRAFFICLIGHT_CONFIG")
            .env_remove("TRAFFICLIGHT_PORT")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn trafficlight");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            seen: Vec::new(),
        }
    }

    /// Writes one console line.
    pub async fn send_line(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Closes stdin so the session sees end of input.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Reads lines until one contains `needle` and returns it.
    ///
    /// Panics on EOF or if no such line arrives within `timeout`.
    pub async fn expect_line(&mut self, needle: &str, timeout: Duration) -> String {
        let result = tokio::time::timeout(timeout, async {
            loop {
                let mut line = String::new();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF waiting for '{needle}', saw {:?}", self.seen);
                let line = line.trim_end().to_string();
                self.seen.push(line.clone());
                if line.contains(needle) {
                    return line;
                }
            }
        })
        .await;
        result.unwrap_or_else(|_| panic!("timed out waiting for '{needle}', saw {:?}", self.seen))
    }

    /// Process id of the child.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Waits for the process to exit and returns its exit code.
    pub async fn wait(mut self) -> Option<i32> {
        self.stdin = None;
        let status = tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("process did not exit in time")
            .expect("wait failed");
        status.code()
    }

    /// Runs `trafficlight` to completion with the given arguments.
    pub fn spawn_command(args: &[&str]) -> Output {
        std::process::Command::new(Self::bin())
            .args(args)
            .env_remove("TRAFFICLIGHT_CONFIG")
            .env_remove("TRAFFICLIGHT_PORT")
            .output()
            .expect("failed to run trafficlight")
    }

    /// Path to a file under `tests/fixtures`.
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn bin() -> &'static str {
        env!("CARGO_BIN_EXE_trafficlight")
    }
}
