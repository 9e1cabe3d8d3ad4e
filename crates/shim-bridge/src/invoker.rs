//! Subprocess lifecycle for a single shim invocation.
//!
//! Each call spawns a fresh shim, writes the payload from a separate task
//! while the calling path reads stdout to EOF, and hands the exited process
//! to a detached reaper. Everything is bounded by one deadline: when it
//! expires the shim is killed and the call fails with a timeout.
//!
//! ```text
//! preflight ─► spawn ─┬─► writer task ──► stdin (closed when done)
//!                     ├─► read stdout to EOF ──► output bytes
//!                     └─► reaper task (wait, or kill at the deadline)
//! ```

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ShimError};
use crate::preflight;

/// Selector passed to the shim after its configuration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain agent action; the request travels on stdin.
    Action,
    ParseCompound,
    ValidateCompound,
}

impl Mode {
    /// Trailing argument for this mode. A plain action still passes an empty
    /// argument, which the runtime expects.
    pub fn arg(self) -> &'static str {
        match self {
            Mode::Action => "",
            Mode::ParseCompound => "--parse-compound",
            Mode::ValidateCompound => "--validate-compound",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Action => "action",
            Mode::ParseCompound => "parse-compound",
            Mode::ValidateCompound => "validate-compound",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension point for launching the shim process.
///
/// The command arrives fully configured (arguments, piped stdin/stdout,
/// kill on drop); a spawner may observe or decorate it before launching.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, command: &mut Command) -> io::Result<Child>;
}

/// Launches the command as given.
pub struct DirectSpawner;

impl ProcessSpawner for DirectSpawner {
    fn spawn(&self, command: &mut Command) -> io::Result<Child> {
        command.spawn()
    }
}

/// Runs shim invocations. Holds no per-call state; every call owns its own
/// process and pipes.
#[derive(Clone)]
pub struct Invoker {
    spawner: Arc<dyn ProcessSpawner>,
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker").finish_non_exhaustive()
    }
}

impl Invoker {
    pub fn new() -> Self {
        Self {
            spawner: Arc::new(DirectSpawner),
        }
    }

    pub fn with_spawner(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self { spawner }
    }

    /// Run the shim once and return everything it wrote to stdout.
    ///
    /// Paths are checked before anything is spawned. The exit status of the
    /// shim is not consulted: a non-empty stdout is a completed call.
    pub async fn invoke(
        &self,
        executable: &Path,
        config: &Path,
        timeout: Duration,
        mode: Mode,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        preflight::check(executable, config)?;

        let deadline = Instant::now() + timeout;

        let mut command = Command::new(executable);
        command
            .arg("--config")
            .arg(config)
            .arg(mode.arg())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        tracing::debug!(
            executable = %executable.display(),
            %mode,
            timeout_secs = timeout.as_secs_f64(),
            "Spawning ruby compatibility shim"
        );

        let mut child = self.spawner.spawn(&mut command).map_err(ShimError::Start)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ShimError::io("create stdin", io::Error::other("stdin not captured"))
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            ShimError::io("open STDOUT", io::Error::other("stdout not captured"))
        })?;

        // The writer never outlives this call: it is cancelled on every return
        // path, including the future being dropped.
        let cancel = CancellationToken::new();
        let _writer_guard = cancel.clone().drop_guard();
        tokio::spawn(write_input(stdin, input.to_vec(), cancel));

        let mut output = Vec::new();
        let read = tokio::time::timeout_at(deadline, stdout.read_to_end(&mut output)).await;

        match read {
            Err(_elapsed) => {
                let pid = child.id();
                tracing::warn!(
                    ?pid,
                    timeout_secs = timeout.as_secs_f64(),
                    "Ruby compatibility shim timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!(?pid, error = %e, "Failed to kill ruby compatibility shim");
                }
                Err(ShimError::Timeout(timeout))
            }
            Ok(Err(e)) => {
                spawn_reaper(child, deadline);
                Err(ShimError::io("read output", e))
            }
            Ok(Ok(n)) => {
                tracing::trace!(bytes = n, "Read ruby compatibility shim output");
                spawn_reaper(child, deadline);
                if n == 0 {
                    return Err(ShimError::EmptyOutput);
                }
                Ok(output)
            }
        }
    }
}

/// Run the shim with the default spawner.
pub async fn invoke(
    executable: &Path,
    config: &Path,
    timeout: Duration,
    mode: Mode,
    input: &[u8],
) -> Result<Vec<u8>> {
    Invoker::new()
        .invoke(executable, config, timeout, mode, input)
        .await
}

async fn write_input(mut stdin: ChildStdin, input: Vec<u8>, cancel: CancellationToken) {
    let len = input.len();
    let write = async {
        stdin.write_all(&input).await?;
        stdin.flush().await
    };

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::trace!("Input writer cancelled");
        }
        result = write => match result {
            Ok(()) => tracing::trace!(bytes = len, "Wrote ruby compatibility shim input"),
            // A shim that exits without draining stdin produces a broken pipe.
            Err(e) => tracing::debug!(error = %e, "Could not write ruby compatibility shim input"),
        }
    }
    // stdin is dropped here, closing the pipe.
}

/// Wait for the shim to exit without holding up the caller. A shim that is
/// still running at the deadline is killed.
fn spawn_reaper(mut child: Child, deadline: Instant) {
    tokio::spawn(async move {
        let pid = child.id();
        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(?pid, %status, "Ruby compatibility shim exited"),
            Ok(Err(e)) => {
                tracing::debug!(?pid, error = %e, "Failed to wait for ruby compatibility shim")
            }
            Err(_) => {
                tracing::warn!(?pid, "Ruby compatibility shim still running at deadline, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(?pid, error = %e, "Failed to kill ruby compatibility shim");
                }
            }
        }
    });
}
