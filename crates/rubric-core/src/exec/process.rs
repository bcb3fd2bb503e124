//! Real subprocess-backed [`CommandRunner`].
//!
//! Spawns the configured program once per invocation, writes the input to
//! its stdin, and reads stdout and stderr concurrently with waiting for
//! exit. Cancellation is kill-after: when the deadline passes the child is
//! killed and whatever output it produced is returned.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutcome, CommandRunner};

/// How long to keep reading the pipes after the child has exited or been
/// killed. Bounded so a pipe inherited by an orphaned grandchild cannot
/// stall the batch.
const READ_GRACE: Duration = Duration::from_millis(250);

/// Invokes an external program with a prompt on stdin.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
}

impl ProcessRunner {
    /// Create a runner for `program` invoked with the given base arguments.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The configured program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Verify the configured program can be found before starting a batch.
    ///
    /// A path containing a separator must exist as given; a bare name must
    /// resolve through `PATH`.
    pub fn preflight(&self) -> Result<()> {
        if resolve_program(&self.program).is_some() {
            return Ok(());
        }
        bail!(
            "required command '{}' not found -- is it installed and on PATH?",
            self.program
        )
    }
}

/// Locate `program` the way the OS would: literally if it names a path,
/// otherwise by scanning the `PATH` directories.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        return as_path.is_file().then(|| as_path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, input: &str, timeout: Duration) -> Result<CommandOutcome> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "failed to spawn '{}' -- is it installed and on PATH?",
                    self.program
                )
            })?;

        // Drain both pipes incrementally into shared buffers, concurrently
        // with waiting for exit. Draining as we wait avoids a deadlock when
        // the child fills a pipe buffer, and whatever was read is available
        // even if the child has to be killed.
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = tokio::spawn(drain(child.stdout.take(), Arc::clone(&stdout_buf)));
        let stderr_task = tokio::spawn(drain(child.stderr.take(), Arc::clone(&stderr_buf)));

        // Deliver the input from a detached task so a child that never reads
        // stdin cannot stall the deadline. Dropping the handle closes the
        // pipe and the child sees EOF; a write failure (child exited without
        // reading) is not an invocation error.
        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_string();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
            });
        }

        let wait_result = tokio::time::timeout(timeout, child.wait()).await;

        match wait_result {
            Ok(Ok(status)) => {
                settle_readers(stdout_task, stderr_task).await;
                let output = combine(&stdout_buf, &stderr_buf);
                // A process killed by a signal has no exit code; fold that
                // into -1 so the outcome stays a plain Exited.
                let exit_code = status.code().unwrap_or(-1);
                Ok(CommandOutcome::Exited { output, exit_code })
            }
            Ok(Err(e)) => Err(e).with_context(|| format!("failed to wait on '{}'", self.program)),
            Err(_) => {
                debug!(program = %self.program, "deadline passed, killing child");
                let _ = child.kill().await;
                settle_readers(stdout_task, stderr_task).await;
                let output = combine(&stdout_buf, &stderr_buf);
                Ok(CommandOutcome::TimedOut { output })
            }
        }
    }
}

/// Read `pipe` to EOF, appending each chunk to `buf` as it arrives.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: Arc<Mutex<Vec<u8>>>) {
    let Some(mut pipe) = pipe else { return };
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.lock().unwrap().extend_from_slice(&chunk[..n]),
        }
    }
}

/// Give the reader tasks a bounded window to hit EOF. They normally finish
/// the instant the child dies; the bound covers pipes kept open by orphaned
/// grandchildren.
async fn settle_readers(
    stdout_task: tokio::task::JoinHandle<()>,
    stderr_task: tokio::task::JoinHandle<()>,
) {
    let _ = tokio::time::timeout(READ_GRACE, async {
        let _ = stdout_task.await;
        let _ = stderr_task.await;
    })
    .await;
}

/// Snapshot the buffers: stdout first, stderr appended.
fn combine(stdout_buf: &Mutex<Vec<u8>>, stderr_buf: &Mutex<Vec<u8>>) -> String {
    let mut output = String::from_utf8_lossy(&stdout_buf.lock().unwrap()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf.lock().unwrap()).into_owned();
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&stderr);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_exits_zero_with_output() {
        let runner = ProcessRunner::new("sh", vec!["-c".into(), "echo hello world".into()]);
        let outcome = runner.run("", Duration::from_secs(10)).await.unwrap();
        match outcome {
            CommandOutcome::Exited { output, exit_code } => {
                assert_eq!(exit_code, 0);
                assert!(output.contains("hello world"), "got: {output:?}");
            }
            other => panic!("expected Exited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn input_reaches_stdin() {
        let runner = ProcessRunner::new("cat", vec![]);
        let outcome = runner
            .run("line one\nline two", Duration::from_secs(10))
            .await
            .unwrap();
        match outcome {
            CommandOutcome::Exited { output, exit_code } => {
                assert_eq!(exit_code, 0);
                assert_eq!(output, "line one\nline two");
            }
            other => panic!("expected Exited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let runner = ProcessRunner::new("sh", vec!["-c".into(), "exit 3".into()]);
        let outcome = runner.run("", Duration::from_secs(10)).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Exited {
                output: String::new(),
                exit_code: 3,
            }
        );
    }

    #[tokio::test]
    async fn stderr_is_captured_after_stdout() {
        let runner = ProcessRunner::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2".into()],
        );
        let outcome = runner.run("", Duration::from_secs(10)).await.unwrap();
        match outcome {
            CommandOutcome::Exited { output, .. } => {
                assert!(output.contains("out"), "got: {output:?}");
                assert!(output.contains("err"), "got: {output:?}");
            }
            other => panic!("expected Exited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_child_is_killed_at_deadline() {
        let runner = ProcessRunner::new(
            "sh",
            vec!["-c".into(), "echo partial; sleep 60".into()],
        );
        let start = std::time::Instant::now();
        let outcome = runner.run("", Duration::from_millis(500)).await.unwrap();
        assert!(
            start.elapsed() < Duration::from_secs(30),
            "kill-after should not wait for the child's sleep"
        );
        match outcome {
            CommandOutcome::TimedOut { output } => {
                assert!(
                    output.contains("partial"),
                    "partial output should survive the kill, got: {output:?}"
                );
            }
            other => panic!("expected TimedOut, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonexistent_program_is_an_error() {
        let runner = ProcessRunner::new("this_command_does_not_exist_rubric_test", vec![]);
        let err = runner.run("", Duration::from_secs(1)).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("failed to spawn"), "unexpected error: {msg}");
    }

    #[test]
    fn preflight_finds_sh() {
        ProcessRunner::new("sh", vec![])
            .preflight()
            .expect("sh should be on PATH");
    }

    #[test]
    fn preflight_rejects_missing_program() {
        let err = ProcessRunner::new("this_command_does_not_exist_rubric_test", vec![])
            .preflight()
            .unwrap_err();
        assert!(
            err.to_string().contains("not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn preflight_accepts_explicit_existing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("tool.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        ProcessRunner::new(script.to_str().unwrap(), vec![])
            .preflight()
            .expect("explicit path to an existing file should pass");
    }
}
