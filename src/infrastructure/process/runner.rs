//! Subprocess runner with timeout and process-group termination.
//!
//! Every child runs in its own process group so that the nested shells and
//! test runners an agent CLI spawns die with it. On timeout or interrupt the
//! whole group gets SIGTERM, a polled grace period, then SIGKILL.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::infrastructure::process::cleanup::{register_child, unregister_child};

/// Maximum time to wait for graceful shutdown after SIGTERM before SIGKILL.
const SIGTERM_GRACE_PERIOD_SECONDS: u64 = 5;

/// Polling interval when waiting for a process group to exit after SIGTERM.
const KILL_POLL_INTERVAL_MS: u64 = 100;

/// One external command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program plus arguments; the first element is the binary.
    pub argv: Vec<String>,
    /// Working directory, when it differs from the orchestrator's.
    pub cwd: Option<PathBuf>,
    /// Bytes written to the child's stdin (the agent prompt). `None` wires
    /// stdin to /dev/null, which a background process group requires anyway.
    pub stdin: Option<Vec<u8>>,
    /// Secondary capture file some CLIs write their final message to. When
    /// set and non-empty after the run, its content replaces the stream
    /// capture in the returned output.
    pub capture_file: Option<PathBuf>,
}

impl CommandSpec {
    /// Spec for a plain argv with no stdin and no capture file.
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            cwd: None,
            stdin: None,
            capture_file: None,
        }
    }

    /// Spec for a shell command line run through `sh -c`.
    pub fn shell(command_line: &str) -> Self {
        Self::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            command_line.to_string(),
        ])
    }
}

/// What became of a finished run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The child exited on its own within the deadline.
    Completed {
        exit_code: i32,
        /// Merged stdout+stderr, or the capture file's content when present.
        output: Vec<u8>,
    },
    /// The deadline expired and the process group was killed.
    TimedOut,
}

impl RunOutcome {
    /// Whether the run completed with exit code zero.
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed { exit_code: 0, .. })
    }
}

/// Stateless runner; safe to call from any number of workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run one command to completion, or to the timeout.
    ///
    /// `timeout` of `None` means the command is trusted to terminate on its
    /// own (verification gates).
    pub async fn run(
        &self,
        spec: CommandSpec,
        timeout: Option<Duration>,
    ) -> OrchestrateResult<RunOutcome> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| OrchestrateError::Config("empty command line".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }
        if spec.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            // stdin must not reach the terminal: the child sits in a
            // background process group and a terminal read means SIGTTIN.
            cmd.stdin(Stdio::null());
        }

        // SAFETY: pre_exec runs between fork() and exec() where only
        // async-signal-safe functions are permitted. setpgid is
        // async-signal-safe per POSIX.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| OrchestrateError::Spawn {
            program: program.clone(),
            source: e,
        })?;

        let child_pid = child
            .id()
            .ok_or_else(|| OrchestrateError::Config("child has no pid".to_string()))?
            as i32;
        register_child(child_pid);
        debug!(pid = child_pid, program = %program, "subprocess spawned");

        let stdin_bytes = spec.stdin;
        let mut stdin_handle = child.stdin.take();
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let wait = async {
            let feed = async {
                if let (Some(handle), Some(bytes)) = (stdin_handle.as_mut(), stdin_bytes.as_ref()) {
                    let _ = handle.write_all(bytes).await;
                }
                // Close stdin so the child sees EOF.
                drop(stdin_handle.take());
            };
            let mut out = Vec::new();
            let mut err = Vec::new();
            let read_out = async {
                if let Some(ref mut stdout) = stdout {
                    let _ = stdout.read_to_end(&mut out).await;
                }
            };
            let read_err = async {
                if let Some(ref mut stderr) = stderr {
                    let _ = stderr.read_to_end(&mut err).await;
                }
            };
            tokio::join!(feed, read_out, read_err);
            let status = child.wait().await?;
            out.extend_from_slice(&err);
            Ok::<_, std::io::Error>((status, out))
        };

        let waited = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await,
            None => Ok(wait.await),
        };

        match waited {
            Err(_elapsed) => {
                warn!(pid = child_pid, "subprocess timed out; killing process group");
                kill_process_group(child_pid).await;
                let _ = child.wait().await;
                unregister_child(child_pid);
                Ok(RunOutcome::TimedOut)
            }
            Ok(result) => {
                unregister_child(child_pid);
                let (status, mut output) = result?;

                if let Some(ref capture) = spec.capture_file {
                    match tokio::fs::read(capture).await {
                        Ok(bytes) if !bytes.is_empty() => output = bytes,
                        _ => {}
                    }
                }

                let exit_code = status.code().unwrap_or(-1);
                debug!(pid = child_pid, exit_code, bytes = output.len(), "subprocess exited");
                Ok(RunOutcome::Completed { exit_code, output })
            }
        }
    }
}

/// Kill a process group: SIGTERM, poll for exit, then SIGKILL survivors.
///
/// The blocking poll-and-sleep loop runs on the blocking thread pool so
/// async workers are not stalled.
pub async fn kill_process_group(pgid: i32) {
    tokio::task::spawn_blocking(move || kill_process_group_blocking(pgid))
        .await
        .unwrap_or_else(|e| warn!("kill_process_group task panicked: {e}"));
}

/// Synchronous group kill, shared with the signal handler.
pub fn kill_process_group_blocking(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};

    let pgid = Pid::from_raw(pgid);

    if let Err(nix::errno::Errno::ESRCH) = killpg(pgid, Signal::SIGTERM) {
        return; // already gone
    }

    let deadline =
        std::time::Instant::now() + Duration::from_secs(SIGTERM_GRACE_PERIOD_SECONDS);
    let poll_interval = Duration::from_millis(KILL_POLL_INTERVAL_MS);

    while std::time::Instant::now() < deadline {
        // Signal 0 checks for existence without delivering anything.
        match killpg(pgid, None) {
            Err(nix::errno::Errno::ESRCH) => return,
            _ => std::thread::sleep(poll_interval),
        }
    }

    let _ = killpg(pgid, Signal::SIGKILL);
}
