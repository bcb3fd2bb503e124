//! External command execution.
//!
//! Both the agent and the judge are reached through the [`CommandRunner`]
//! trait so tests can substitute a canned implementation. The real
//! implementation, [`ProcessRunner`], spawns a subprocess per invocation.

pub mod process;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use process::ProcessRunner;

/// The outcome of one command invocation that got as far as spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The process exited (with any code) before the deadline.
    Exited {
        /// Combined stdout and stderr.
        output: String,
        exit_code: i32,
    },
    /// The process was killed at the deadline; whatever output it produced
    /// before being killed is retained.
    TimedOut { output: String },
}

/// Adapter interface for invoking an external text-generation process.
///
/// `input` is delivered to the process (on stdin for [`ProcessRunner`]) and
/// the combined output is captured. An `Err` means a process-level failure
/// such as the binary failing to spawn; timeouts and non-zero exits are
/// ordinary [`CommandOutcome`] values, not errors.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, input: &str, timeout: Duration) -> Result<CommandOutcome>;
}

// Compile-time assertion: CommandRunner must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn CommandRunner) {}
};
