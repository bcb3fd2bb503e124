//! `rubric score` command: judge every completed run in a results directory.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use rubric_core::results::ResultsDir;
use rubric_core::score::{ScorerConfig, score_batch};

use crate::config;

pub async fn run_score(
    config_path: Option<&Path>,
    results_dir: &Path,
    timeout_secs: u64,
) -> Result<()> {
    let cfg = config::resolve(config_path)?;

    let judge = cfg.judge.runner();
    judge.preflight()?;

    let results = ResultsDir::open(results_dir)?;
    let scorer_config = ScorerConfig {
        timeout: Duration::from_secs(timeout_secs),
    };

    println!(
        "Scoring {} with '{}' (timeout {timeout_secs}s)...",
        results.root().display(),
        cfg.judge.command
    );

    let stats = score_batch(&results, &judge, &scorer_config).await?;

    println!();
    println!(
        "Scored {} case(s): {} judged, {} skipped, {} parse errors, {} errors.",
        stats.total(),
        stats.judged,
        stats.skipped,
        stats.parse_errors,
        stats.errors
    );

    Ok(())
}
