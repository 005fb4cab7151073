//! Subprocess execution with a wall-clock timeout.

use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::checker::CheckerError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long pipe output is awaited once the child has exited.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured result of one tool invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Stdout and stderr are drained on their own threads so a chatty tool
/// cannot block on a full pipe while we poll for exit. On unix the child
/// leads its own process group, and the whole group is killed once the
/// child is done, so background processes it started cannot outlive the
/// call. Pipe output is only awaited for [`DRAIN_GRACE`] after exit.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> std::io::Result<CommandOutput> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stderr"))?;

    let stdout_rx = drain_in_background(stdout);
    let stderr_rx = drain_in_background(stderr);

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    timed_out = true;
                    kill_process_group(child.id());
                    let _ = child.kill();
                    break child.wait().ok();
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_process_group(child.id());
                let _ = child.kill();
                return Err(e);
            }
        }
    };

    // Descendants left running still hold the pipes open.
    kill_process_group(child.id());

    let deadline = Instant::now() + DRAIN_GRACE;
    let stdout_bytes = collect_drained(&stdout_rx, deadline);
    let stderr_bytes = collect_drained(&stderr_rx, deadline);

    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        timed_out,
    })
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    // ESRCH just means the group is already gone.
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL)
        && e != nix::errno::Errno::ESRCH
    {
        tracing::debug!(pid, error = %e, "failed to kill process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn drain_in_background<R: Read + Send + 'static>(source: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(source);
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect_drained(rx: &mpsc::Receiver<Vec<u8>>, deadline: Instant) -> Vec<u8> {
    let wait = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(wait).unwrap_or_else(|_| {
        tracing::debug!("output pipe still open after exit, discarding remaining output");
        Vec::new()
    })
}

/// Run an external analysis tool, mapping spawn and timeout failures to [`CheckerError`].
pub(crate) fn run_tool(
    tool: &str,
    command: &mut Command,
    timeout: Duration,
) -> Result<CommandOutput, CheckerError> {
    tracing::debug!(tool, ?command, "running checker tool");
    let output = run_with_timeout(command, timeout).map_err(|e| spawn_error(tool, &e))?;
    if output.timed_out {
        return Err(CheckerError::TimedOut {
            tool: tool.to_string(),
            secs: timeout.as_secs(),
        });
    }
    Ok(output)
}

pub(crate) fn spawn_error(tool: &str, err: &std::io::Error) -> CheckerError {
    if err.kind() == std::io::ErrorKind::NotFound {
        CheckerError::ToolMissing {
            tool: tool.to_string(),
        }
    } else {
        CheckerError::Crashed {
            tool: tool.to_string(),
            reason: format!("failed to start: {}", err),
        }
    }
}

/// A throwaway directory holding the script under analysis.
pub(crate) struct ScriptDir {
    dir: TempDir,
    script: std::path::PathBuf,
}

impl ScriptDir {
    pub(crate) fn new(tool: &str, code: &str) -> Result<Self, CheckerError> {
        let crashed = |e: std::io::Error| CheckerError::Crashed {
            tool: tool.to_string(),
            reason: format!("could not stage script: {}", e),
        };
        let dir = tempfile::Builder::new()
            .prefix("pyforge-")
            .tempdir()
            .map_err(crashed)?;
        let script = dir.path().join("generated_script.py");
        std::fs::write(&script, code).map_err(crashed)?;
        Ok(Self { dir, script })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn script(&self) -> &Path {
        &self.script
    }
}
