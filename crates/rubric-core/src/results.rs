//! Flat-file results store, keyed by case id.
//!
//! One directory holds every artifact for a batch:
//!
//! ```text
//! results/
//!   <id>.prompt.txt    the prompt sent to the agent, verbatim
//!   <id>.output.txt    combined agent output
//!   <id>.meta.json     RunResult
//!   <id>.score.json    ScoreRecord
//!   manifest.json      Manifest, one per runner invocation
//!   report-<ts>.md     rendered reports
//! ```
//!
//! Artifacts are never shared across cases and re-runs overwrite by id, so
//! a partial failure cannot corrupt another case's data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::run::{Manifest, RunResult};
use crate::score::ScoreRecord;

const PROMPT_SUFFIX: &str = ".prompt.txt";
const OUTPUT_SUFFIX: &str = ".output.txt";
const META_SUFFIX: &str = ".meta.json";
const SCORE_SUFFIX: &str = ".score.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Handle on a results directory.
#[derive(Debug, Clone)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    /// Use `root`, creating it (and parents) if needed. For the runner.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create results directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Use an existing `root`; an absent directory is an error. For the
    /// scorer and reporter, which only consume prior artifacts.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("results directory {} does not exist", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- paths ----------------------------------------------------------

    pub fn prompt_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{PROMPT_SUFFIX}"))
    }

    pub fn output_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{OUTPUT_SUFFIX}"))
    }

    pub fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{META_SUFFIX}"))
    }

    pub fn score_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{SCORE_SUFFIX}"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    // -- writes ---------------------------------------------------------

    pub fn write_prompt(&self, id: &str, prompt: &str) -> Result<()> {
        write_text(&self.prompt_path(id), prompt)
    }

    pub fn write_output(&self, id: &str, output: &str) -> Result<()> {
        write_text(&self.output_path(id), output)
    }

    pub fn write_run_result(&self, result: &RunResult) -> Result<()> {
        write_json(&self.meta_path(&result.id), result)
    }

    pub fn write_score_record(&self, record: &ScoreRecord) -> Result<()> {
        write_json(&self.score_path(&record.case_id), record)
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json(&self.manifest_path(), manifest)
    }

    // -- reads ----------------------------------------------------------

    pub fn read_prompt(&self, id: &str) -> Result<String> {
        read_text(&self.prompt_path(id))
    }

    pub fn read_output(&self, id: &str) -> Result<String> {
        read_text(&self.output_path(id))
    }

    pub fn read_manifest(&self) -> Result<Manifest> {
        read_json(&self.manifest_path())
    }

    /// Every run result in the directory, sorted by case id for
    /// deterministic processing order.
    pub fn read_run_results(&self) -> Result<Vec<RunResult>> {
        let mut runs: Vec<RunResult> = self.read_all(META_SUFFIX)?;
        runs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runs)
    }

    /// Every score record in the directory, sorted by case id.
    pub fn read_score_records(&self) -> Result<Vec<ScoreRecord>> {
        let mut records: Vec<ScoreRecord> = self.read_all(SCORE_SUFFIX)?;
        records.sort_by(|a, b| a.case_id.cmp(&b.case_id));
        Ok(records)
    }

    /// Case id -> stack label, from whatever run results are present. Used
    /// by the reporter to label rows; absent metas just mean blank labels.
    pub fn stack_labels(&self) -> HashMap<String, String> {
        match self.read_run_results() {
            Ok(runs) => runs.into_iter().map(|r| (r.id, r.stack)).collect(),
            Err(e) => {
                warn!(error = %e, "could not read run results for stack labels");
                HashMap::new()
            }
        }
    }

    /// Read every `*<suffix>` file in the directory, skipping entries that
    /// fail to parse (with a warning) so one corrupt artifact cannot block
    /// a whole pass.
    fn read_all<T: DeserializeOwned>(&self, suffix: &str) -> Result<Vec<T>> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read results directory {}", self.root.display()))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed to read entry in {}", self.root.display())
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(suffix) {
                continue;
            }
            match read_json(&path) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable artifact");
                }
            }
        }
        Ok(items)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}
