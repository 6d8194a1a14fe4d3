// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded execution of external tools.
//
// Every OCR tool runs as a child process with piped output and a hard
// wall-clock limit.  On unix the child leads its own process group, and on
// timeout the whole group is killed so helpers it spawned (tesseract
// workers, wrapper scripts) do not outlive the job.  A non-zero exit is a
// failure carrying the captured stderr.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use cniwerk_core::error::CniError;

/// Stderr bytes kept in error messages.
const STDERR_TAIL_BYTES: usize = 512;

/// One external command to run.
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub timeout: Duration,
    pub current_dir: Option<PathBuf>,
}

/// Captured result of a successful run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{program}` timed out after {}ms", .timeout.as_millis())]
    Timeout { program: String, timeout: Duration },

    #[error("`{program}` exited with {status}: {}", stderr_tail(.stderr))]
    NonZeroExit {
        program: String,
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn program(&self) -> &str {
        match self {
            Self::Timeout { program, .. }
            | Self::NonZeroExit { program, .. }
            | Self::Spawn { program, .. }
            | Self::Io { program, .. } => program,
        }
    }
}

impl From<ProcessError> for CniError {
    fn from(err: ProcessError) -> Self {
        CniError::tool(err.program().to_owned(), err.to_string())
    }
}

/// Last [`STDERR_TAIL_BYTES`] of stderr, lossily decoded and trimmed.
fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_owned()
}

impl ProcessInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Run to completion, or kill the child after `timeout`.
    pub async fn run(&self) -> Result<ProcessOutput, ProcessError> {
        let started = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();

        debug!(program = %self.program, pid = ?pid, args = self.args.len(), "tool started");

        // Dropping the wait future drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(
                    program = %self.program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "tool timed out, killed"
                );
                return Err(ProcessError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
            Ok(result) => result.map_err(|source| ProcessError::Io {
                program: self.program.clone(),
                source,
            })?,
        };

        let elapsed = started.elapsed();
        if !output.status.success() {
            warn!(
                program = %self.program,
                status = %output.status,
                elapsed_ms = elapsed.as_millis() as u64,
                "tool exited with failure"
            );
            return Err(ProcessError::NonZeroExit {
                program: self.program.clone(),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        debug!(
            program = %self.program,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            "tool finished"
        );

        Ok(ProcessOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status,
            elapsed,
        })
    }
}

/// SIGKILL every process in the group led by `pid`.
///
/// The group outlives its leader while any member is alive, so this still
/// reaches grandchildren after the leader itself has been killed.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = raw, error = %e, "failed to kill tool process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

impl ProcessOutput {
    /// Stdout decoded as UTF-8, invalid sequences replaced.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessInvocation {
        ProcessInvocation::new("sh", Duration::from_secs(5)).args(["-c", script])
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = sh("printf 'hello\\nworld'").run().await.unwrap();
        assert_eq!(out.stdout_text(), "hello\nworld");
        assert!(out.status.success());
    }

    #[tokio::test]
    async fn slow_tool_is_killed_at_the_deadline() {
        let started = Instant::now();
        let err = ProcessInvocation::new("sleep", Duration::from_millis(50))
            .arg("5")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // Third field is the state; a zombie is already dead.
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_background_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let mut invocation = sh("sleep 30 & echo $! > helper.pid; wait").current_dir(dir.path());
        invocation.timeout = Duration::from_millis(300);
        let err = invocation.run().await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));

        let pid = std::fs::read_to_string(dir.path().join("helper.pid")).unwrap();
        let pid = pid.trim().to_owned();
        let deadline = Instant::now() + Duration::from_secs(3);
        while is_running(&pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(&pid), "helper {pid} outlived the timeout");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let err = sh("echo 'bad input' >&2; exit 3").run().await.unwrap_err();
        match &err {
            ProcessError::NonZeroExit { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(String::from_utf8_lossy(stderr).trim(), "bad input");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("bad input"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = ProcessInvocation::new("cniwerk-no-such-tool", Duration::from_secs(1))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));

        let cni: CniError = err.into();
        assert_eq!(cni.http_status(), 500);
        assert_eq!(cni.public_message(), "cniwerk-no-such-tool failed");
    }

    #[tokio::test]
    async fn runs_in_the_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh("pwd").current_dir(dir.path()).run().await.unwrap();
        let reported = std::path::PathBuf::from(out.stdout_text().trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let long = vec![b'x'; 4096];
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_BYTES);
    }
}
