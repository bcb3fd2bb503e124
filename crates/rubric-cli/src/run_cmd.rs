//! `rubric run` command: execute a batch of cases through the agent.

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};

use rubric_core::case::{CaseFilter, load_cases};
use rubric_core::results::ResultsDir;
use rubric_core::run::{RunnerConfig, run_batch};

use crate::config;

pub async fn run_run(
    config_path: Option<&Path>,
    cases_file: &Path,
    stack: Option<String>,
    max: Option<usize>,
    timeout_secs: u64,
    out: &Path,
) -> Result<()> {
    let cfg = config::resolve(config_path)?;

    let filter = CaseFilter {
        stack: stack.clone(),
        max,
    };
    let cases = load_cases(cases_file, &filter)?;
    if cases.is_empty() {
        match &stack {
            Some(stack) => bail!(
                "no cases in {} match stack {stack:?}",
                cases_file.display()
            ),
            None => bail!("no valid cases in {}", cases_file.display()),
        }
    }

    let agent = cfg.agent.runner();
    agent.preflight()?;

    let results = ResultsDir::create(out)?;
    let runner_config = RunnerConfig {
        timeout: Duration::from_secs(timeout_secs),
        cases_file: cases_file.display().to_string(),
        stack_filter: stack,
    };

    println!(
        "Running {} case(s) through '{}' (timeout {timeout_secs}s)...",
        cases.len(),
        cfg.agent.command
    );

    let manifest = run_batch(&cases, &agent, &results, &runner_config).await?;

    println!();
    println!(
        "Done: {} completed, {} errors out of {} case(s).",
        manifest.completed, manifest.errors, manifest.total_cases
    );
    println!("Artifacts in {}", results.root().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rubric_test_utils::fake_agent_ok;

    /// Write a config file pointing the agent at the given script.
    fn config_for(dir: &Path, agent_script: &Path) -> std::path::PathBuf {
        let path = dir.join("rubric.toml");
        std::fs::write(
            &path,
            format!("[agent]\ncommand = \"{}\"\n", agent_script.display()),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn run_command_end_to_end_with_fake_agent() {
        let tmp = tempfile::tempdir().unwrap();
        let agent = fake_agent_ok(tmp.path(), "done");
        let config = config_for(tmp.path(), &agent);

        let cases_file = tmp.path().join("cases.jsonl");
        std::fs::write(
            &cases_file,
            r#"{"id":"c1","prompt":"p","expected_behavior":"e","stack":"rails","rubric":"r"}"#,
        )
        .unwrap();

        let out = tmp.path().join("results");
        run_run(Some(config.as_path()), &cases_file, None, None, 30, &out)
            .await
            .unwrap();

        let results = ResultsDir::open(&out).unwrap();
        assert_eq!(results.read_run_results().unwrap().len(), 1);
        assert_eq!(results.read_manifest().unwrap().completed, 1);
    }

    #[tokio::test]
    async fn missing_cases_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let agent = fake_agent_ok(tmp.path(), "done");
        let config = config_for(tmp.path(), &agent);

        let err = run_run(
            Some(config.as_path()),
            &tmp.path().join("absent.jsonl"),
            None,
            None,
            30,
            &tmp.path().join("results"),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read cases file"));
    }

    #[tokio::test]
    async fn no_matching_cases_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let agent = fake_agent_ok(tmp.path(), "done");
        let config = config_for(tmp.path(), &agent);

        let cases_file = tmp.path().join("cases.jsonl");
        std::fs::write(&cases_file, r#"{"id":"c1","stack":"rails"}"#).unwrap();

        let err = run_run(
            Some(config.as_path()),
            &cases_file,
            Some("elixir".to_string()),
            None,
            30,
            &tmp.path().join("results"),
        )
        .await
        .unwrap_err();
        assert!(
            err.to_string().contains("no cases"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn missing_agent_binary_fails_before_running() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("rubric.toml");
        std::fs::write(
            &config,
            "[agent]\ncommand = \"this_command_does_not_exist_rubric_test\"\n",
        )
        .unwrap();

        let cases_file = tmp.path().join("cases.jsonl");
        std::fs::write(&cases_file, r#"{"id":"c1"}"#).unwrap();

        let out = tmp.path().join("results");
        let err = run_run(Some(config.as_path()), &cases_file, None, None, 30, &out)
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("not found"),
            "unexpected error: {err}"
        );
        assert!(!out.exists(), "preflight failure should not create artifacts");
    }
}
