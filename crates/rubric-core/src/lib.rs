//! Core library for the `rubric` evaluation harness.
//!
//! The pipeline is three independently re-runnable stages over a shared
//! results directory:
//!
//! ```text
//! case::load_cases ──> run::run_batch ──> score::score_batch ──> report
//!      (Case)            (RunResult,          (ScoreRecord)      (markdown)
//!                         Manifest)
//! ```
//!
//! Each stage reads typed records written by the previous one and isolates
//! per-case failures: a case that times out, errors, or produces unparsable
//! judge output is recorded as data and never aborts the batch.

pub mod case;
pub mod exec;
pub mod report;
pub mod results;
pub mod run;
pub mod score;
