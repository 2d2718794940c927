//! Child process runner used by the command-backed decision service.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// What a finished (or killed) child produced.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped past the capture limit, stdout and stderr combined.
    pub dropped_bytes: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> Option<String> {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
    }
}

/// Spawn `cmd`, feed it `input` on stdin and wait at most `timeout`.
///
/// Both pipes are drained on reader threads while the child runs so a chatty
/// child cannot block on a full pipe. At most `capture_limit` bytes per stream
/// are kept.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, capture_limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    capture_limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn decision command")?;
    debug!(pid = child.id(), "decision command spawned");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, capture_limit));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, capture_limit));

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        // A child that exits without reading stdin closes the pipe early.
        if let Err(err) = stdin.write_all(input) {
            warn!(err = %err, "decision command closed stdin early");
        }
    }

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "decision command timed out, killing"
            );
            child.kill().context("kill timed-out command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("collect stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("collect stderr")?;
    let dropped_bytes = stdout_dropped + stderr_dropped;
    if dropped_bytes > 0 {
        warn!(dropped_bytes, "command output exceeded capture limit");
    }

    debug!(exit_code = ?status.code(), timed_out, "decision command finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        dropped_bytes,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 4096];
    loop {
        let read = reader.read(&mut chunk).context("read command output")?;
        if read == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len()).min(read);
        kept.extend_from_slice(&chunk[..room]);
        dropped += read - room;
    }
}
