//! Case file loading with validation and filtering.
//!
//! A cases file is line-delimited JSON: one case object per line. Loading is
//! lenient per line -- blank lines are skipped, malformed lines and lines
//! without a usable `id` are skipped with a warning -- but strict at the file
//! level: an unreadable file is an error for the caller to surface.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One unit of work to evaluate: a prompt plus the expectations and rubric
/// the judge will score its output against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier; artifacts in the results directory are keyed by it.
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub expected_behavior: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub rubric: String,
}

/// Optional narrowing applied while collecting cases.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Keep only cases whose `stack` equals this value.
    pub stack: Option<String>,
    /// Stop collecting once this many cases have been kept.
    pub max: Option<usize>,
}

impl CaseFilter {
    fn matches(&self, case: &Case) -> bool {
        match &self.stack {
            Some(stack) => case.stack == *stack,
            None => true,
        }
    }
}

/// Read and parse a cases file.
///
/// Returns an error only if the file itself cannot be read; per-line
/// problems are logged and skipped. The returned list preserves file order.
pub fn load_cases(path: &Path, filter: &CaseFilter) -> Result<Vec<Case>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cases file {}", path.display()))?;
    Ok(parse_cases(&contents, filter))
}

/// Parse line-delimited JSON case definitions.
///
/// Per line: blank lines are skipped silently; invalid JSON and missing or
/// unusable `id` values are skipped with a warning. The stack filter is an
/// equality check; the max cap stops collection once reached. Duplicate ids
/// pass through unmodified.
pub fn parse_cases(contents: &str, filter: &CaseFilter) -> Vec<Case> {
    let mut cases = Vec::new();

    for (lineno, line) in contents.lines().enumerate() {
        if let Some(max) = filter.max {
            if cases.len() >= max {
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let case: Case = match serde_json::from_str(trimmed) {
            Ok(case) => case,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed case line");
                continue;
            }
        };

        if case.id.is_empty() {
            warn!(line = lineno + 1, "skipping case with empty id");
            continue;
        }

        // Artifacts are keyed by id, so an id that would escape the results
        // directory is unusable.
        if case.id.contains('/') || case.id.contains('\\') || case.id.contains("..") {
            warn!(line = lineno + 1, id = %case.id, "skipping case with path-like id");
            continue;
        }

        if filter.matches(&case) {
            cases.push(case);
        }
    }

    cases
}
