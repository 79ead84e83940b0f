//! Typed wrappers around the external collaborators (aligner, consensus
//! caller, polisher, reference retrieval, subsampler). Each wrapper owns the
//! tool's command line and output-naming conventions and hands back explicit
//! paths, so the pipeline never depends on a tool's internal file naming.

pub mod aligner;
pub mod caller;
pub mod polisher;
pub mod retrieval;
pub mod samtools;
pub mod subsampler;

use crate::utils::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on a single external invocation. A hung tool is killed and
/// surfaces as an `ExternalTool` error, failing only the affected sample.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeout(Duration);

impl StageTimeout {
    pub fn from_secs(secs: u64) -> Self {
        StageTimeout(Duration::from_secs(secs))
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn wait_with_timeout(child: &mut Child, tool: &str, timeout: StageTimeout) -> Result<ExitStatus> {
    wait_until(child, tool, Instant::now() + timeout.0, timeout)
}

/// Deadline-based wait so that both ends of a pipe share one timeout.
fn wait_until(
    child: &mut Child,
    tool: &str,
    deadline: Instant,
    timeout: StageTimeout,
) -> Result<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => return Err(Error::tool(tool, e)),
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::tool(
                tool,
                format!("timed out after {}s and was killed", timeout.0.as_secs()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Drains a child's stderr on a separate thread so the pipe cannot fill up
/// while the parent polls for exit.
fn drain_stderr(child: &mut Child) -> Option<thread::JoinHandle<String>> {
    child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    })
}

fn stderr_tail(text: &str) -> String {
    let tail: Vec<&str> = text.lines().rev().take(5).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("; ")
}

fn finish(status: ExitStatus, stderr: String, tool: &str) -> Result<()> {
    if status.success() {
        if !stderr.is_empty() {
            log::trace!("{} stderr: {}", tool, stderr_tail(&stderr));
        }
        Ok(())
    } else {
        Err(Error::tool(
            tool,
            format!("{} ({})", status, stderr_tail(&stderr)),
        ))
    }
}

/// Runs a command to completion, enforcing the stage timeout and reporting
/// the stderr tail on failure.
pub(crate) fn run_checked(mut cmd: Command, tool: &str, timeout: StageTimeout) -> Result<()> {
    log::debug!("Running {:?}", cmd);
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| Error::tool(tool, e))?;
    let drain = drain_stderr(&mut child);
    let status = wait_with_timeout(&mut child, tool, timeout)?;
    let stderr = drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    finish(status, stderr, tool)
}

/// Runs `producer | consumer`, enforcing the stage timeout on both ends.
/// The consumer names the pipeline in errors since it produces the output.
pub(crate) fn run_piped(
    mut producer: Command,
    mut consumer: Command,
    tool: &str,
    timeout: StageTimeout,
) -> Result<()> {
    log::debug!("Running {:?} | {:?}", producer, consumer);
    let deadline = Instant::now() + timeout.0;
    producer.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut upstream = producer.spawn().map_err(|e| Error::tool(tool, e))?;
    let upstream_drain = drain_stderr(&mut upstream);
    let upstream_out = upstream
        .stdout
        .take()
        .ok_or_else(|| Error::tool(tool, "failed to open pipe"))?;

    consumer.stdin(Stdio::from(upstream_out)).stderr(Stdio::piped());
    let mut downstream = consumer.spawn().map_err(|e| Error::tool(tool, e))?;
    let downstream_drain = drain_stderr(&mut downstream);

    let downstream_status = wait_until(&mut downstream, tool, deadline, timeout);
    if downstream_status.is_err() {
        // Consumer died or timed out; do not leave the producer running.
        let _ = upstream.kill();
    }
    let upstream_status = wait_until(&mut upstream, tool, deadline, timeout);

    let upstream_err = upstream_drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let downstream_err = downstream_drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    finish(upstream_status?, upstream_err, tool)?;
    finish(downstream_status?, downstream_err, tool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_checked_success() {
        let mut cmd = Command::new("true");
        cmd.stdout(Stdio::null());
        assert!(run_checked(cmd, "true", StageTimeout::from_secs(5)).is_ok());
    }

    #[test]
    fn test_run_checked_failure_is_external_tool_error() {
        let cmd = Command::new("false");
        let err = run_checked(cmd, "false", StageTimeout::from_secs(5)).unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
    }

    #[test]
    fn test_timeout_kills_hung_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let start = Instant::now();
        let err = run_checked(cmd, "sleep", StageTimeout::from_secs(1)).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_piped_timeout_is_shared_across_both_ends() {
        // Consumer finishes at 2s; the hung producer must be killed at the
        // 3s deadline, not 3s after the consumer finished.
        let mut producer = Command::new("sleep");
        producer.arg("30");
        let mut consumer = Command::new("sleep");
        consumer.arg("2");
        let start = Instant::now();
        let err = run_piped(producer, consumer, "sleep", StageTimeout::from_secs(3)).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_binary_is_external_tool_error() {
        let cmd = Command::new("definitely-not-a-real-tool");
        let err = run_checked(cmd, "definitely-not-a-real-tool", StageTimeout::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
    }
}
