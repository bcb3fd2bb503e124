//! Shared test utilities for rubric integration tests.
//!
//! Two flavors of fake external command:
//! - [`ScriptedRunner`], an in-process [`CommandRunner`] yielding canned
//!   outcomes in order, for deterministic pipeline tests;
//! - executable `sh` scripts written under a tempdir, for tests that
//!   exercise the real subprocess path.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use rubric_core::exec::{CommandOutcome, CommandRunner};

/// One canned reply for a [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Process exited with the given combined output and code.
    Exit { output: String, exit_code: i32 },
    /// Process was killed at the deadline with this partial output.
    Timeout { output: String },
    /// Invocation itself failed (e.g. binary missing).
    Fail { message: String },
}

impl Scripted {
    /// Shorthand for a clean exit.
    pub fn ok(output: impl Into<String>) -> Self {
        Self::Exit {
            output: output.into(),
            exit_code: 0,
        }
    }
}

/// A [`CommandRunner`] that replays a scripted sequence of outcomes.
///
/// Invoking it more times than there are scripted outcomes is an error, so
/// tests catch stages that call out more often than they should.
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<Scripted>>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<Scripted>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _input: &str, _timeout: Duration) -> Result<CommandOutcome> {
        let next = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("ScriptedRunner invoked with no outcomes left"))?;
        match next {
            Scripted::Exit { output, exit_code } => {
                Ok(CommandOutcome::Exited { output, exit_code })
            }
            Scripted::Timeout { output } => Ok(CommandOutcome::TimedOut { output }),
            Scripted::Fail { message } => Err(anyhow::anyhow!("{message}")),
        }
    }
}

/// Write an executable `sh` script under `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("failed to write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
    }
    path
}

/// A fake agent that echoes a fixed line and exits 0.
pub fn fake_agent_ok(dir: &Path, output: &str) -> PathBuf {
    write_script(dir, "fake_agent_ok.sh", &format!("echo '{output}'\n"))
}

/// A fake agent that exits with the given code after printing to stderr.
pub fn fake_agent_failing(dir: &Path, exit_code: i32) -> PathBuf {
    write_script(
        dir,
        "fake_agent_failing.sh",
        &format!("echo 'agent blew up' >&2\nexit {exit_code}\n"),
    )
}

/// A fake agent that prints one line and then sleeps past any test timeout.
pub fn fake_agent_hanging(dir: &Path) -> PathBuf {
    write_script(dir, "fake_agent_hanging.sh", "echo 'started'\nsleep 3600\n")
}

/// A fake judge that replies with a fixed body regardless of its prompt.
pub fn fake_judge(dir: &Path, reply: &str) -> PathBuf {
    // Feed the reply through a heredoc so quotes in JSON survive.
    write_script(
        dir,
        "fake_judge.sh",
        &format!("cat >/dev/null\ncat <<'RUBRIC_EOF'\n{reply}\nRUBRIC_EOF\n"),
    )
}
