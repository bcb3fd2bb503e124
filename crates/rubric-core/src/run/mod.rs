//! Runner stage: executes each case through the agent and records artifacts.
//!
//! For every case the runner writes the prompt verbatim, invokes the agent
//! under the batch timeout, classifies the outcome, and writes the captured
//! output plus a [`RunResult`] meta record. A failing case never stops the
//! batch; after the last case a [`Manifest`] summarizes the run.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::case::Case;
use crate::exec::{CommandOutcome, CommandRunner};
use crate::results::ResultsDir;

/// Marker appended to the captured output when the agent is killed at the
/// timeout boundary.
pub const TIMEOUT_MARKER: &str = "[TIMEOUT]";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Terminal state of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The agent exited 0 before the deadline.
    Completed,
    /// The agent was killed at the deadline.
    Timeout,
    /// The agent exited non-zero, or failed at the process level.
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for RunStatus {
    type Err = RunStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "timeout" => Ok(Self::Timeout),
            "error" => Ok(Self::Error),
            other => Err(RunStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RunStatus`] string.
#[derive(Debug, Clone)]
pub struct RunStatusParseError(pub String);

impl fmt::Display for RunStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run status: {:?}", self.0)
    }
}

impl std::error::Error for RunStatusParseError {}

/// The recorded outcome of executing one case, written as `<id>.meta.json`.
///
/// Denormalizes `stack`, `expected_behavior`, and `rubric` from the case so
/// the scorer never needs the original cases file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    pub stack: String,
    pub expected_behavior: String,
    pub rubric: String,
    pub status: RunStatus,
    pub duration_seconds: f64,
    /// `None` when the agent was killed at the deadline or failed to spawn;
    /// distinct from a normal non-zero exit.
    pub exit_code: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// Per-run summary, written once as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub cases_file: String,
    pub stack_filter: Option<String>,
    pub total_cases: usize,
    pub completed: usize,
    /// Every non-completed run: timeouts and errors alike.
    pub errors: usize,
    pub timestamp: DateTime<Utc>,
}

/// Explicit tally threaded through the batch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub completed: usize,
    pub errors: usize,
}

impl RunStats {
    fn record(&mut self, status: RunStatus) {
        match status {
            RunStatus::Completed => self.completed += 1,
            RunStatus::Timeout | RunStatus::Error => self.errors += 1,
        }
    }
}

/// Batch-level settings for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wall-clock limit per agent invocation.
    pub timeout: Duration,
    /// Recorded in the manifest: where the cases came from.
    pub cases_file: String,
    /// Recorded in the manifest: the stack filter in effect, if any.
    pub stack_filter: Option<String>,
}

// ---------------------------------------------------------------------------
// Batch execution
// ---------------------------------------------------------------------------

/// Run every case through the agent, sequentially and in order.
///
/// Writes three artifacts per case (prompt, output, meta) and one manifest
/// for the batch. Agent failures are classified and recorded per case; only
/// artifact I/O errors propagate.
pub async fn run_batch(
    cases: &[Case],
    agent: &dyn CommandRunner,
    results: &ResultsDir,
    config: &RunnerConfig,
) -> Result<Manifest> {
    let mut stats = RunStats::default();

    for case in cases {
        let result = run_case(case, agent, results, config.timeout).await?;
        info!(
            id = %result.id,
            status = %result.status,
            duration_seconds = result.duration_seconds,
            "case finished"
        );
        stats.record(result.status);
    }

    let manifest = Manifest {
        cases_file: config.cases_file.clone(),
        stack_filter: config.stack_filter.clone(),
        total_cases: cases.len(),
        completed: stats.completed,
        errors: stats.errors,
        timestamp: Utc::now(),
    };
    results.write_manifest(&manifest)?;

    Ok(manifest)
}

/// Execute one case: prompt artifact, agent invocation, classification,
/// output and meta artifacts.
async fn run_case(
    case: &Case,
    agent: &dyn CommandRunner,
    results: &ResultsDir,
    timeout: Duration,
) -> Result<RunResult> {
    results.write_prompt(&case.id, &case.prompt)?;

    let start = Instant::now();
    let outcome = agent.run(&case.prompt, timeout).await;
    let duration_seconds = start.elapsed().as_secs_f64();

    let (status, mut output, exit_code) = match outcome {
        Ok(CommandOutcome::Exited { output, exit_code: 0 }) => {
            (RunStatus::Completed, output, Some(0))
        }
        Ok(CommandOutcome::Exited { output, exit_code }) => {
            (RunStatus::Error, output, Some(exit_code))
        }
        Ok(CommandOutcome::TimedOut { output }) => (RunStatus::Timeout, output, None),
        Err(e) => {
            warn!(id = %case.id, error = %e, "agent invocation failed");
            (RunStatus::Error, format!("[PROCESS ERROR] {e:#}\n"), None)
        }
    };

    if status == RunStatus::Timeout {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(TIMEOUT_MARKER);
        output.push('\n');
    }

    results.write_output(&case.id, &output)?;

    let result = RunResult {
        id: case.id.clone(),
        stack: case.stack.clone(),
        expected_behavior: case.expected_behavior.clone(),
        rubric: case.rubric.clone(),
        status,
        duration_seconds,
        exit_code,
        timestamp: Utc::now(),
    };
    results.write_run_result(&result)?;

    Ok(result)
}
