//! Structured score extraction from free-form judge text.
//!
//! Judges are instructed to reply with a single JSON object but routinely
//! wrap it in prose or markdown fences. Extraction is three tiers, stopping
//! at the first success:
//!
//! 1. strict: parse the whole trimmed reply;
//! 2. balanced scan: locate the first syntactically complete top-level
//!    object by tracking brace depth and string/escape state;
//! 3. greedy: the slice from the first `{` to the last `}`.

use serde::Deserialize;
use thiserror::Error;

use super::DimensionScores;

/// The score object a judge is asked to produce.
///
/// The five dimensions are required; everything else the judge asserts
/// (its own weighted score, a verdict label) is accepted but recomputed or
/// discarded downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeResponse {
    pub correctness: f64,
    pub code_quality: f64,
    pub security: f64,
    pub performance: f64,
    pub test_coverage: f64,
    #[serde(default)]
    pub weighted_score: Option<f64>,
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl JudgeResponse {
    /// The judge-asserted dimensions, untouched. Clamping happens when the
    /// record is built.
    pub fn dimensions(&self) -> DimensionScores {
        DimensionScores {
            correctness: self.correctness,
            code_quality: self.code_quality,
            security: self.security,
            performance: self.performance,
            test_coverage: self.test_coverage,
        }
    }
}

/// All three extraction tiers failed.
#[derive(Debug, Error)]
#[error("no parsable score object in judge response")]
pub struct ExtractError;

/// Extract a [`JudgeResponse`] from a raw judge reply.
pub fn extract_judge_response(raw: &str) -> Result<JudgeResponse, ExtractError> {
    // Tier 1: the whole reply is the object.
    if let Ok(response) = serde_json::from_str::<JudgeResponse>(raw.trim()) {
        return Ok(response);
    }

    // Tier 2: first balanced top-level object anywhere in the reply.
    if let Some(slice) = first_balanced_object(raw) {
        if let Ok(response) = serde_json::from_str::<JudgeResponse>(slice) {
            return Ok(response);
        }
    }

    // Tier 3: greedy first-`{`-to-last-`}` slice.
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(response) = serde_json::from_str::<JudgeResponse>(&raw[start..=end]) {
                return Ok(response);
            }
        }
    }

    Err(ExtractError)
}

/// Locate the first syntactically complete top-level `{...}` in `text`.
///
/// Tracks nesting depth plus string and escape state, so braces inside
/// string values do not fool the scan.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
