//! The judging pass: one judge invocation per completed run, a zero-filled
//! record for everything else.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::exec::{CommandOutcome, CommandRunner};
use crate::results::ResultsDir;
use crate::run::{RunResult, RunStatus};

use super::extract::extract_judge_response;
use super::{JudgeStatus, ScoreRecord};

/// How much of an unparsable judge reply is retained for audit.
const RAW_RESPONSE_LIMIT: usize = 500;

/// Settings for the scorer pass.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Wall-clock limit per judge invocation.
    pub timeout: Duration,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
        }
    }
}

/// Explicit tally threaded through the scorer pass, keyed by how each
/// case's judging ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreStats {
    pub judged: usize,
    pub skipped: usize,
    pub parse_errors: usize,
    pub errors: usize,
}

impl ScoreStats {
    fn record(&mut self, status: JudgeStatus) {
        match status {
            JudgeStatus::Completed => self.judged += 1,
            JudgeStatus::Skipped => self.skipped += 1,
            JudgeStatus::ParseError => self.parse_errors += 1,
            JudgeStatus::Error => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.judged + self.skipped + self.parse_errors + self.errors
    }
}

// ---------------------------------------------------------------------------
// Batch scoring
// ---------------------------------------------------------------------------

/// Score every run result in the directory, writing exactly one
/// `<id>.score.json` per `<id>.meta.json`.
///
/// Per-case failures of any kind become zero-filled records; the pass always
/// covers the full directory. Errors only for an empty directory or artifact
/// I/O failures.
pub async fn score_batch(
    results: &ResultsDir,
    judge: &dyn CommandRunner,
    config: &ScorerConfig,
) -> Result<ScoreStats> {
    let runs = results.read_run_results()?;
    if runs.is_empty() {
        anyhow::bail!(
            "no run results found in {} -- run the batch first",
            results.root().display()
        );
    }

    let mut stats = ScoreStats::default();

    for run in &runs {
        let record = score_case(run, results, judge, config).await;
        info!(
            id = %record.case_id,
            judge_status = %record.judge_status,
            weighted_score = record.weighted_score,
            "case scored"
        );
        stats.record(record.judge_status);
        results.write_score_record(&record)?;
    }

    Ok(stats)
}

/// Produce the single [`ScoreRecord`] for one run result.
async fn score_case(
    run: &RunResult,
    results: &ResultsDir,
    judge: &dyn CommandRunner,
    config: &ScorerConfig,
) -> ScoreRecord {
    // Non-completed runs are never judged.
    if run.status != RunStatus::Completed {
        return ScoreRecord::zero_filled(
            &run.id,
            JudgeStatus::Skipped,
            format!("run status was {}; judge not invoked", run.status),
        );
    }

    // A completed run must have its prompt and output artifacts.
    let prompt = match results.read_prompt(&run.id) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(id = %run.id, error = %e, "missing prompt artifact");
            return ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::Error,
                format!("missing prompt artifact: {e:#}"),
            );
        }
    };
    let output = match results.read_output(&run.id) {
        Ok(output) => output,
        Err(e) => {
            warn!(id = %run.id, error = %e, "missing output artifact");
            return ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::Error,
                format!("missing output artifact: {e:#}"),
            );
        }
    };

    let judge_prompt = compose_judge_prompt(&prompt, &output, &run.expected_behavior, &run.rubric);

    let reply = match judge.run(&judge_prompt, config.timeout).await {
        Ok(CommandOutcome::Exited { output, exit_code: 0 }) => output,
        Ok(CommandOutcome::Exited { exit_code, .. }) => {
            warn!(id = %run.id, exit_code, "judge exited non-zero");
            return ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::Error,
                format!("judge exited with code {exit_code}"),
            );
        }
        Ok(CommandOutcome::TimedOut { .. }) => {
            warn!(id = %run.id, "judge timed out");
            return ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::Error,
                format!("judge timed out after {}s", config.timeout.as_secs()),
            );
        }
        Err(e) => {
            warn!(id = %run.id, error = %e, "judge invocation failed");
            return ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::Error,
                format!("judge invocation failed: {e:#}"),
            );
        }
    };

    match extract_judge_response(&reply) {
        Ok(response) => {
            let notes = response.notes.clone().unwrap_or_default();
            ScoreRecord::from_judged_scores(&run.id, response.dimensions(), notes)
        }
        Err(_) => {
            warn!(id = %run.id, "no parsable score object in judge response");
            let mut record = ScoreRecord::zero_filled(
                &run.id,
                JudgeStatus::ParseError,
                "judge response contained no parsable score object",
            );
            record.raw_response = Some(truncate_chars(&reply, RAW_RESPONSE_LIMIT));
            record
        }
    }
}

/// Build the prompt the judge is sent for one completed case.
pub fn compose_judge_prompt(
    prompt: &str,
    output: &str,
    expected_behavior: &str,
    rubric: &str,
) -> String {
    format!(
        "You are a strict code reviewer scoring an AI coding agent's work.\n\
         \n\
         ## Original task given to the agent\n\
         {prompt}\n\
         \n\
         ## Expected behavior\n\
         {expected_behavior}\n\
         \n\
         ## Scoring rubric\n\
         {rubric}\n\
         \n\
         ## Agent output\n\
         {output}\n\
         \n\
         Score the agent output on five dimensions, each from 0.0 to 1.0:\n\
         correctness, code_quality, security, performance, test_coverage.\n\
         Weights: correctness 0.40, code_quality 0.20, security 0.15,\n\
         performance 0.10, test_coverage 0.15.\n\
         \n\
         Reply with a single JSON object and nothing else:\n\
         {{\"correctness\": 0.0, \"code_quality\": 0.0, \"security\": 0.0,\n\
          \"performance\": 0.0, \"test_coverage\": 0.0,\n\
          \"weighted_score\": 0.0, \"notes\": \"one-sentence summary\"}}\n"
    )
}

/// Truncate to at most `max_chars` characters, appending "..." if truncated.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let mut truncated: String = s.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
