//! Running external commands with a deadline and an interrupt flag.
//!
//! The child is polled with `try_wait` every 50 ms. Its stdout and stderr are
//! read on helper threads, so a child that writes more than a pipe buffer
//! never blocks on a full pipe while we wait for it to exit.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BenchError, Result};
use crate::pipeline::Stage;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared flag set when the user asks the run to stop.
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// A flag that is not yet set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running stage stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Everything written to stdout (lossy UTF-8).
    pub stdout: String,
    /// Everything written to stderr (lossy UTF-8).
    pub stderr: String,
    /// Wall-clock time until exit.
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

fn drain(stream: Option<impl Read + Send + 'static>) -> Option<JoinHandle<Vec<u8>>> {
    stream.map(|mut s| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            // A read error only truncates diagnostics; the exit status still
            // decides success.
            if let Err(e) = s.read_to_end(&mut buf) {
                debug!(error = %e, "pipe read ended early");
            }
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| BenchError::internal("pipe reader thread panicked"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed, child already exited");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "failed to reap child");
    }
}

/// Run `command` to completion, at most `timeout`, unless `interrupt` is set.
///
/// stdin is closed; stdout and stderr are captured separately.
///
/// # Errors
/// - [`BenchError::Toolchain`] if the program cannot be started.
/// - [`BenchError::TimedOut`] if it is still running after `timeout`.
/// - [`BenchError::Interrupted`] if `interrupt` is set while it runs.
pub fn run(
    command: &mut Command,
    stage: Stage,
    timeout: Duration,
    interrupt: &Interrupt,
) -> Result<CommandOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(%program, ?stage, timeout_secs = timeout.as_secs(), "spawning");

    let start = Instant::now();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BenchError::Toolchain {
            stage,
            detail: if e.kind() == std::io::ErrorKind::NotFound {
                format!(
                    "cannot run `{program}`: not found.\n  To fix: install it or point elm-bench at it in elm-bench.toml."
                )
            } else {
                format!("cannot run `{program}`: {e}")
            },
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if interrupt.is_set() {
                    stop(&mut child);
                    return Err(BenchError::Interrupted { stage });
                }
                if start.elapsed() >= timeout {
                    stop(&mut child);
                    return Err(BenchError::TimedOut {
                        stage,
                        after: timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                stop(&mut child);
                return Err(BenchError::workspace_io(format!("waiting for `{program}`"), e));
            }
        }
    };

    // Ctrl-C reaches the child too; it often exits before the next poll.
    if !status.success() && interrupt.is_set() {
        debug!(%program, code = ?status.code(), "child exited after interrupt");
        return Err(BenchError::Interrupted { stage });
    }

    let output = CommandOutput {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
        elapsed: start.elapsed(),
    };
    debug!(
        %program,
        code = ?output.status.code(),
        elapsed_ms = u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
        "child exited"
    );
    Ok(output)
}
