//! End-to-end pipeline test over a shared results directory:
//! load -> run -> score -> report, with scripted agent and judge replies.

use std::time::Duration;

use rubric_core::case::{CaseFilter, parse_cases};
use rubric_core::report::{aggregate, render_markdown, write_report};
use rubric_core::results::ResultsDir;
use rubric_core::run::{RunnerConfig, run_batch};
use rubric_core::score::{JudgeStatus, ScorerConfig, Verdict, score_batch};

use rubric_test_utils::{Scripted, ScriptedRunner};

const ALL_ONES: &str = r#"{"correctness":1.0,"code_quality":1.0,"security":1.0,"performance":1.0,"test_coverage":1.0,"weighted_score":1.0,"notes":"flawless"}"#;

fn cases_fixture() -> String {
    [
        r#"{"id":"case-1","prompt":"build a login page","expected_behavior":"renders a form","stack":"rails","rubric":"standard"}"#,
        r#"{"id":"case-2","prompt":"add caching","expected_behavior":"cache hit on second read","stack":"rails","rubric":"standard"}"#,
        r#"{"id":"case-3","prompt":"write a migration","expected_behavior":"schema updated","stack":"nextjs","rubric":"standard"}"#,
    ]
    .join("\n")
}

fn runner_config() -> RunnerConfig {
    RunnerConfig {
        timeout: Duration::from_secs(5),
        cases_file: "cases.jsonl".to_string(),
        stack_filter: None,
    }
}

/// The canonical mixed-outcome batch: one perfect case, one agent timeout,
/// one completed case whose judge reply is unparsable prose.
#[tokio::test]
async fn three_case_scenario_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let results = ResultsDir::create(tmp.path()).unwrap();

    let cases = parse_cases(&cases_fixture(), &CaseFilter::default());
    assert_eq!(cases.len(), 3);

    // Stage 1: run.
    let agent = ScriptedRunner::new(vec![
        Scripted::ok("login page built"),
        Scripted::Timeout {
            output: "still thinking".to_string(),
        },
        Scripted::ok("migration written"),
    ]);
    let manifest = run_batch(&cases, &agent, &results, &runner_config())
        .await
        .unwrap();

    assert_eq!(manifest.total_cases, 3);
    assert_eq!(manifest.completed, 2);
    assert_eq!(manifest.errors, 1);

    // Stage 2: score. The judge is only consulted for the two completed
    // runs, in case-id order.
    let judge = ScriptedRunner::new(vec![
        Scripted::ok(ALL_ONES),
        Scripted::ok("A very strong submission, I would say 9/10, well done."),
    ]);
    let stats = score_batch(&results, &judge, &ScorerConfig::default())
        .await
        .unwrap();

    assert_eq!(stats.total(), 3);
    assert_eq!(stats.judged, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.parse_errors, 1);
    assert_eq!(judge.remaining(), 0, "judge invoked exactly twice");

    // Every run result has exactly one score record.
    let runs = results.read_run_results().unwrap();
    let records = results.read_score_records().unwrap();
    assert_eq!(records.len(), runs.len());

    let by_id = |id: &str| records.iter().find(|r| r.case_id == id).unwrap();

    let first = by_id("case-1");
    assert!((first.weighted_score - 1.0).abs() < 1e-9);
    assert_eq!(first.verdict, Verdict::Excellent);
    assert_eq!(first.judge_status, JudgeStatus::Completed);

    let second = by_id("case-2");
    assert_eq!(second.weighted_score, 0.0);
    assert_eq!(second.verdict, Verdict::NeedsFixes);
    assert_eq!(second.judge_status, JudgeStatus::Skipped);

    let third = by_id("case-3");
    assert_eq!(third.weighted_score, 0.0);
    assert_eq!(third.judge_status, JudgeStatus::ParseError);
    assert!(
        third.raw_response.as_deref().unwrap().contains("9/10"),
        "parse failures retain the raw reply"
    );

    // Stage 3: report.
    let report_stats = aggregate(&records);
    assert!((report_stats.mean_weighted - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(report_stats.overall_verdict, Verdict::NeedsFixes);
    assert_eq!(
        report_stats.flagged,
        vec!["case-2".to_string(), "case-3".to_string()]
    );

    let (path, written_stats) = write_report(&results).unwrap();
    assert_eq!(written_stats, report_stats);

    let markdown = std::fs::read_to_string(&path).unwrap();
    assert!(markdown.contains("| Total cases | 3 |"));
    assert!(markdown.contains("| Average score | 0.33 |"));
    assert!(markdown.contains("| Overall verdict | Needs fixes |"));
    assert!(markdown.contains("| case-1 | rails | 1.00 | Excellent |"));
    assert!(markdown.contains("### case-2"));
    assert!(markdown.contains("### case-3"));
    assert!(
        !markdown.contains("### case-1"),
        "an excellent case is not flagged"
    );
}

/// Re-running the scorer against an unchanged directory reproduces the same
/// statistics; the reporter is idempotent apart from its timestamp.
#[tokio::test]
async fn rescoring_and_rereporting_are_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let results = ResultsDir::create(tmp.path()).unwrap();
    let cases = parse_cases(&cases_fixture(), &CaseFilter::default());

    let agent = ScriptedRunner::new(vec![
        Scripted::ok("one"),
        Scripted::ok("two"),
        Scripted::ok("three"),
    ]);
    run_batch(&cases, &agent, &results, &runner_config())
        .await
        .unwrap();

    let first_judge = ScriptedRunner::new(vec![
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
    ]);
    score_batch(&results, &first_judge, &ScorerConfig::default())
        .await
        .unwrap();
    let first_records = results.read_score_records().unwrap();

    let second_judge = ScriptedRunner::new(vec![
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
    ]);
    score_batch(&results, &second_judge, &ScorerConfig::default())
        .await
        .unwrap();
    let second_records = results.read_score_records().unwrap();

    assert_eq!(first_records, second_records);
    assert_eq!(aggregate(&first_records), aggregate(&second_records));
}

/// The stack filter and max cap narrow the batch before the runner sees it.
#[tokio::test]
async fn filters_narrow_the_batch() {
    let filter = CaseFilter {
        stack: Some("rails".to_string()),
        ..Default::default()
    };
    let cases = parse_cases(&cases_fixture(), &filter);
    let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["case-1", "case-2"]);

    let tmp = tempfile::tempdir().unwrap();
    let results = ResultsDir::create(tmp.path()).unwrap();
    let agent = ScriptedRunner::new(vec![Scripted::ok("a"), Scripted::ok("b")]);
    let config = RunnerConfig {
        timeout: Duration::from_secs(5),
        cases_file: "cases.jsonl".to_string(),
        stack_filter: Some("rails".to_string()),
    };
    let manifest = run_batch(&cases, &agent, &results, &config).await.unwrap();

    assert_eq!(manifest.total_cases, 2);
    assert_eq!(manifest.stack_filter.as_deref(), Some("rails"));
    assert!(results.read_prompt("case-3").is_err(), "filtered case never ran");
}

/// A fenced judge reply scores identically to the bare JSON reply.
#[tokio::test]
async fn fenced_and_bare_judge_replies_score_identically() {
    let score_with = |reply: String| async move {
        let tmp = tempfile::tempdir().unwrap();
        let results = ResultsDir::create(tmp.path()).unwrap();
        let cases = parse_cases(
            r#"{"id":"only","prompt":"p","expected_behavior":"e","stack":"s","rubric":"r"}"#,
            &CaseFilter::default(),
        );
        let agent = ScriptedRunner::new(vec![Scripted::ok("done")]);
        run_batch(&cases, &agent, &results, &runner_config())
            .await
            .unwrap();
        let judge = ScriptedRunner::new(vec![Scripted::ok(reply)]);
        score_batch(&results, &judge, &ScorerConfig::default())
            .await
            .unwrap();
        results.read_score_records().unwrap().remove(0)
    };

    let bare = score_with(ALL_ONES.to_string()).await;
    let fenced = score_with(format!("```json\n{ALL_ONES}\n```")).await;

    assert_eq!(bare.scores, fenced.scores);
    assert_eq!(bare.weighted_score, fenced.weighted_score);
    assert_eq!(bare.verdict, fenced.verdict);
    assert_eq!(bare.judge_status, fenced.judge_status);
}

/// Rendering the same records twice with a fixed timestamp is
/// byte-identical.
#[tokio::test]
async fn report_rendering_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let results = ResultsDir::create(tmp.path()).unwrap();
    let cases = parse_cases(&cases_fixture(), &CaseFilter::default());

    let agent = ScriptedRunner::new(vec![
        Scripted::ok("one"),
        Scripted::Exit {
            output: "broken".to_string(),
            exit_code: 1,
        },
        Scripted::ok("three"),
    ]);
    run_batch(&cases, &agent, &results, &runner_config())
        .await
        .unwrap();

    let judge = ScriptedRunner::new(vec![Scripted::ok(ALL_ONES), Scripted::ok(ALL_ONES)]);
    score_batch(&results, &judge, &ScorerConfig::default())
        .await
        .unwrap();

    let records = results.read_score_records().unwrap();
    let stats = aggregate(&records);
    let stacks = results.stack_labels();
    let when = chrono::Utc::now();

    let first = render_markdown(&stats, &records, &stacks, when);
    let second = render_markdown(&stats, &records, &stacks, when);
    assert_eq!(first, second);
}

/// Interrupting after the runner still leaves a valid, scoreable directory:
/// the stages only communicate through artifacts.
#[tokio::test]
async fn stages_are_independently_rerunnable() {
    let tmp = tempfile::tempdir().unwrap();
    let cases = parse_cases(&cases_fixture(), &CaseFilter::default());

    {
        let results = ResultsDir::create(tmp.path()).unwrap();
        let agent = ScriptedRunner::new(vec![
            Scripted::ok("one"),
            Scripted::ok("two"),
            Scripted::ok("three"),
        ]);
        run_batch(&cases, &agent, &results, &runner_config())
            .await
            .unwrap();
    }

    // A fresh handle over the same directory, as a separate invocation
    // would create.
    let reopened = ResultsDir::open(tmp.path()).unwrap();
    assert_eq!(reopened.read_run_results().unwrap().len(), 3);

    let judge = ScriptedRunner::new(vec![
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
        Scripted::ok(ALL_ONES),
    ]);
    let stats = score_batch(&reopened, &judge, &ScorerConfig::default())
        .await
        .unwrap();
    assert_eq!(stats.judged, 3);

    let (_, report_stats) = write_report(&reopened).unwrap();
    assert_eq!(report_stats.total, 3);
    assert_eq!(report_stats.overall_verdict, Verdict::Excellent);
}
