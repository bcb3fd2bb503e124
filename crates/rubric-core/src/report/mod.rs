//! Reporter stage: aggregate score records into a rendered markdown report.
//!
//! Aggregation is a plain associative reduction over the records, split from
//! rendering so the statistics are deterministic and testable; the embedded
//! generation timestamp is the only run-to-run difference in output.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::results::ResultsDir;
use crate::score::{ACCEPTABLE_THRESHOLD, DimensionScores, ScoreRecord, Verdict};

/// Notes are flattened and clipped to this many characters in the per-case
/// table.
const NOTES_LIMIT: usize = 80;

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Verdict bucket tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub excellent: usize,
    pub acceptable: usize,
    pub needs_fixes: usize,
}

impl VerdictCounts {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Excellent => self.excellent += 1,
            Verdict::Acceptable => self.acceptable += 1,
            Verdict::NeedsFixes => self.needs_fixes += 1,
        }
    }
}

/// Batch-level statistics derived from a set of score records.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportStats {
    pub total: usize,
    pub mean_weighted: f64,
    pub dimension_means: DimensionScores,
    pub verdict_counts: VerdictCounts,
    /// Derived from `mean_weighted` with the same thresholds as per-case
    /// verdicts.
    pub overall_verdict: Verdict,
    /// Case ids with a weighted score strictly below the acceptability
    /// threshold, regardless of verdict label.
    pub flagged: Vec<String>,
}

/// Reduce all score records to batch statistics. Order-independent.
pub fn aggregate(records: &[ScoreRecord]) -> ReportStats {
    let total = records.len();
    let n = total.max(1) as f64;

    let mut weighted_sum = 0.0;
    let mut dim_sums = DimensionScores::zero();
    let mut verdict_counts = VerdictCounts::default();
    let mut flagged = Vec::new();

    for record in records {
        weighted_sum += record.weighted_score;
        dim_sums.correctness += record.scores.correctness;
        dim_sums.code_quality += record.scores.code_quality;
        dim_sums.security += record.scores.security;
        dim_sums.performance += record.scores.performance;
        dim_sums.test_coverage += record.scores.test_coverage;
        verdict_counts.record(record.verdict);
        if record.weighted_score < ACCEPTABLE_THRESHOLD {
            flagged.push(record.case_id.clone());
        }
    }

    let mean_weighted = weighted_sum / n;

    ReportStats {
        total,
        mean_weighted,
        dimension_means: DimensionScores {
            correctness: dim_sums.correctness / n,
            code_quality: dim_sums.code_quality / n,
            security: dim_sums.security / n,
            performance: dim_sums.performance / n,
            test_coverage: dim_sums.test_coverage / n,
        },
        verdict_counts,
        overall_verdict: Verdict::from_score(mean_weighted),
        flagged,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the full markdown report.
pub fn render_markdown(
    stats: &ReportStats,
    records: &[ScoreRecord],
    stacks: &HashMap<String, String>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();

    out.push_str("# Evaluation Report\n\n");
    out.push_str(&format!("Generated: {}\n\n", generated_at.to_rfc3339()));

    // Summary.
    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    out.push_str(&format!("| Total cases | {} |\n", stats.total));
    out.push_str(&format!("| Average score | {:.2} |\n", stats.mean_weighted));
    out.push_str(&format!("| Overall verdict | {} |\n", stats.overall_verdict));
    out.push_str(&format!("| Excellent | {} |\n", stats.verdict_counts.excellent));
    out.push_str(&format!("| Acceptable | {} |\n", stats.verdict_counts.acceptable));
    out.push_str(&format!("| Needs fixes | {} |\n", stats.verdict_counts.needs_fixes));
    out.push('\n');

    // Per-case table.
    out.push_str("## Per-case results\n\n");
    out.push_str("| Case | Stack | Score | Verdict | Notes |\n|---|---|---|---|---|\n");
    for record in records {
        let stack = stacks
            .get(&record.case_id)
            .map(String::as_str)
            .unwrap_or("");
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} |\n",
            record.case_id,
            stack,
            record.weighted_score,
            record.verdict,
            table_notes(&record.notes),
        ));
    }
    out.push('\n');

    // Dimension averages.
    out.push_str("## Dimension averages\n\n");
    out.push_str("| Dimension | Average |\n|---|---|\n");
    let dims = &stats.dimension_means;
    out.push_str(&format!("| correctness | {:.2} |\n", dims.correctness));
    out.push_str(&format!("| code_quality | {:.2} |\n", dims.code_quality));
    out.push_str(&format!("| security | {:.2} |\n", dims.security));
    out.push_str(&format!("| performance | {:.2} |\n", dims.performance));
    out.push_str(&format!("| test_coverage | {:.2} |\n", dims.test_coverage));
    out.push('\n');

    // Flagged cases.
    out.push_str(&format!(
        "## Flagged cases (score < {ACCEPTABLE_THRESHOLD:.2})\n\n"
    ));
    if stats.flagged.is_empty() {
        out.push_str("None.\n");
    } else {
        for record in records.iter().filter(|r| stats.flagged.contains(&r.case_id)) {
            out.push_str(&format!("### {}\n\n", record.case_id));
            out.push_str(&format!(
                "- weighted score: {:.2} ({})\n",
                record.weighted_score, record.verdict
            ));
            out.push_str(&format!("- judge status: {}\n", record.judge_status));
            out.push_str(&format!("- correctness: {:.2}\n", record.scores.correctness));
            out.push_str(&format!("- code_quality: {:.2}\n", record.scores.code_quality));
            out.push_str(&format!("- security: {:.2}\n", record.scores.security));
            out.push_str(&format!("- performance: {:.2}\n", record.scores.performance));
            out.push_str(&format!(
                "- test_coverage: {:.2}\n",
                record.scores.test_coverage
            ));
            if !record.notes.is_empty() {
                out.push_str(&format!("- notes: {}\n", record.notes.replace('\n', " ")));
            }
            out.push('\n');
        }
    }

    out
}

/// Aggregate and render everything in the results directory, writing a
/// timestamped report file. Errors if there are no score records.
///
/// Returns the report path together with the statistics so callers can
/// summarize without re-reading the directory.
pub fn write_report(results: &ResultsDir) -> Result<(PathBuf, ReportStats)> {
    let records = results.read_score_records()?;
    if records.is_empty() {
        anyhow::bail!(
            "no score records found in {} -- run the scorer first",
            results.root().display()
        );
    }

    let stats = aggregate(&records);
    let stacks = results.stack_labels();
    let generated_at = Utc::now();
    let rendered = render_markdown(&stats, &records, &stacks, generated_at);

    let path = results
        .root()
        .join(format!("report-{}.md", generated_at.format("%Y%m%d-%H%M%S")));
    std::fs::write(&path, rendered)
        .map_err(|e| anyhow::anyhow!("failed to write report {}: {e}", path.display()))?;

    Ok((path, stats))
}

/// Flatten and clip a notes string for a single markdown table cell.
fn table_notes(notes: &str) -> String {
    let flat = notes.replace(['\n', '\r'], " ").replace('|', "\\|");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= NOTES_LIMIT {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(NOTES_LIMIT).collect();
    clipped.push_str("...");
    clipped
}
