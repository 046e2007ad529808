//! Spawns an external tool's stdio as the bidirectional stream the core
//! drives (supplementary: every real DAP/MCP integration gets its stream by
//! spawning a child process; this is that plumbing, not a new protocol
//! concern).

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
};
use tracing::debug;

use crate::error::ProcessError;

/// Stdio halves of a spawned child, ready to hand to
/// [`JsonRpcDriver::start`](crate::jsonrpc::JsonRpcDriver::start) or
/// [`DapClient::start`](crate::dap::DapClient::start). Stderr is drained
/// into `tracing` in the background so it never blocks the child; the
/// `Child` itself is kept alive (and killed on drop) for as long as this
/// transport is.
pub struct StdioTransport {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    child: Child,
}

impl StdioTransport {
    /// Splits into the reader/writer pair the drivers expect, discarding the
    /// `Child` handle (it stays alive via `kill_on_drop` regardless).
    pub fn into_stream(self) -> (ChildStdout, ChildStdin) {
        (self.stdout, self.stdin)
    }

    pub fn child(&self) -> &Child {
        &self.child
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }
}

/// Spawns `command` with piped stdio, retrying on `ExecutableFileBusy`
/// (errno 26) with a capped exponential backoff — the same condition and
/// policy the host tool's own launcher guards against when a binary is
/// still being written by a package manager or build step.
pub async fn spawn_stdio(mut command: Command) -> Result<StdioTransport, ProcessError> {
    command
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let command_debug = format!("{command:?}");
    let mut backoff = Duration::from_millis(2);
    let mut child = None;
    for attempt in 0..5 {
        match command.spawn() {
            Ok(spawned) => {
                child = Some(spawned);
                break;
            }
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ProcessError::Spawn {
                    command: command_debug,
                    source,
                });
            }
        }
    }

    let mut child = child.expect("spawn loop returns Ok or Err before exhausting retries");

    let stdout = child.stdout.take().ok_or(ProcessError::StdoutUnavailable)?;
    let stdin = child.stdin.take().ok_or(ProcessError::StdinUnavailable)?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_stderr(stderr));
    }

    Ok(StdioTransport {
        stdin,
        stdout,
        child,
    })
}

async fn drain_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("child stderr: {line}");
    }
}
