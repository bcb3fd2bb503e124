//! Scorer stage: one [`ScoreRecord`] per run result, no exceptions.
//!
//! Completed runs are judged by an external model and the structured score
//! is extracted from its reply; everything else (skipped, invocation
//! failures, unparsable replies) is zero-filled so the record count always
//! matches the run count. Verdicts and weighted scores are recomputed here
//! from the dimension scores -- judge arithmetic is never trusted.

pub mod extract;
pub mod judge;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use judge::{ScoreStats, ScorerConfig, score_batch};

/// Weighted score at or above this is `Acceptable`; below it the case is
/// flagged in the report.
pub const ACCEPTABLE_THRESHOLD: f64 = 0.70;
/// Weighted score at or above this is `Excellent`.
pub const EXCELLENT_THRESHOLD: f64 = 0.90;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Quality bucket derived deterministically from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Excellent,
    Acceptable,
    #[serde(rename = "Needs fixes")]
    NeedsFixes,
}

impl Verdict {
    /// Bucket a weighted score. Boundary-exact: 0.90 is `Excellent`, 0.70
    /// is `Acceptable`.
    pub fn from_score(weighted_score: f64) -> Self {
        if weighted_score >= EXCELLENT_THRESHOLD {
            Self::Excellent
        } else if weighted_score >= ACCEPTABLE_THRESHOLD {
            Self::Acceptable
        } else {
            Self::NeedsFixes
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Acceptable => "Acceptable",
            Self::NeedsFixes => "Needs fixes",
        };
        f.write_str(s)
    }
}

impl FromStr for Verdict {
    type Err = VerdictParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Excellent" => Ok(Self::Excellent),
            "Acceptable" => Ok(Self::Acceptable),
            "Needs fixes" => Ok(Self::NeedsFixes),
            other => Err(VerdictParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Verdict`] string.
#[derive(Debug, Clone)]
pub struct VerdictParseError(pub String);

impl fmt::Display for VerdictParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid verdict: {:?}", self.0)
    }
}

impl std::error::Error for VerdictParseError {}

// ---------------------------------------------------------------------------
// Judge status
// ---------------------------------------------------------------------------

/// How the judge pass ended for one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeStatus {
    /// The judge replied and a structured score was extracted.
    Completed,
    /// The run was not `completed`, so the judge was never invoked.
    Skipped,
    /// The judge replied but no score object could be extracted.
    ParseError,
    /// Judge invocation failed, or a required artifact was missing.
    Error,
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::ParseError => "parse_error",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for JudgeStatus {
    type Err = JudgeStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "parse_error" => Ok(Self::ParseError),
            "error" => Ok(Self::Error),
            other => Err(JudgeStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`JudgeStatus`] string.
#[derive(Debug, Clone)]
pub struct JudgeStatusParseError(pub String);

impl fmt::Display for JudgeStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid judge status: {:?}", self.0)
    }
}

impl std::error::Error for JudgeStatusParseError {}

// ---------------------------------------------------------------------------
// Dimension scores
// ---------------------------------------------------------------------------

/// The five rubric axes, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub correctness: f64,
    pub code_quality: f64,
    pub security: f64,
    pub performance: f64,
    pub test_coverage: f64,
}

impl DimensionScores {
    pub const CORRECTNESS_WEIGHT: f64 = 0.40;
    pub const CODE_QUALITY_WEIGHT: f64 = 0.20;
    pub const SECURITY_WEIGHT: f64 = 0.15;
    pub const PERFORMANCE_WEIGHT: f64 = 0.10;
    pub const TEST_COVERAGE_WEIGHT: f64 = 0.15;

    /// All-zero scores, used for every zero-fill path.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Clamp every dimension into [0, 1].
    pub fn clamped(self) -> Self {
        Self {
            correctness: self.correctness.clamp(0.0, 1.0),
            code_quality: self.code_quality.clamp(0.0, 1.0),
            security: self.security.clamp(0.0, 1.0),
            performance: self.performance.clamp(0.0, 1.0),
            test_coverage: self.test_coverage.clamp(0.0, 1.0),
        }
    }

    /// Combine the dimensions with the fixed weights.
    ///
    /// Callers are expected to clamp first; the result is clamped again so
    /// the weighted score can never leave [0, 1].
    pub fn weighted(&self) -> f64 {
        let sum = self.correctness * Self::CORRECTNESS_WEIGHT
            + self.code_quality * Self::CODE_QUALITY_WEIGHT
            + self.security * Self::SECURITY_WEIGHT
            + self.performance * Self::PERFORMANCE_WEIGHT
            + self.test_coverage * Self::TEST_COVERAGE_WEIGHT;
        sum.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Score record
// ---------------------------------------------------------------------------

/// The recorded outcome of judging one run, written as `<id>.score.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub case_id: String,
    pub scores: DimensionScores,
    pub weighted_score: f64,
    pub verdict: Verdict,
    pub notes: String,
    pub judge_status: JudgeStatus,
    /// Retained only on `parse_error`: the first ~500 characters of the
    /// judge's reply, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ScoreRecord {
    /// The zero-fill record used for every non-judged path.
    pub fn zero_filled(case_id: impl Into<String>, judge_status: JudgeStatus, notes: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            scores: DimensionScores::zero(),
            weighted_score: 0.0,
            verdict: Verdict::NeedsFixes,
            notes: notes.into(),
            judge_status,
            raw_response: None,
        }
    }

    /// Build a judged record: clamp the dimensions, recompute the weighted
    /// score, and derive the verdict from it.
    pub fn from_judged_scores(
        case_id: impl Into<String>,
        scores: DimensionScores,
        notes: impl Into<String>,
    ) -> Self {
        let scores = scores.clamped();
        let weighted_score = scores.weighted();
        Self {
            case_id: case_id.into(),
            scores,
            weighted_score,
            verdict: Verdict::from_score(weighted_score),
            notes: notes.into(),
            judge_status: JudgeStatus::Completed,
            raw_response: None,
        }
    }
}
