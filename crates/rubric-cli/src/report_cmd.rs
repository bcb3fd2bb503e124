//! `rubric report` command: aggregate score records into a markdown report.

use std::path::Path;

use anyhow::Result;

use rubric_core::report::write_report;
use rubric_core::results::ResultsDir;

pub fn run_report(results_dir: &Path) -> Result<()> {
    let results = ResultsDir::open(results_dir)?;
    let (path, stats) = write_report(&results)?;

    println!("Report written to {}", path.display());
    println!();
    println!(
        "{:<20} {}",
        "Total cases:", stats.total
    );
    println!("{:<20} {:.2}", "Average score:", stats.mean_weighted);
    println!("{:<20} {}", "Overall verdict:", stats.overall_verdict);
    println!(
        "{:<20} {} Excellent / {} Acceptable / {} Needs fixes",
        "Verdicts:",
        stats.verdict_counts.excellent,
        stats.verdict_counts.acceptable,
        stats.verdict_counts.needs_fixes
    );
    if !stats.flagged.is_empty() {
        println!("{:<20} {}", "Flagged:", stats.flagged.join(", "));
    }

    Ok(())
}
