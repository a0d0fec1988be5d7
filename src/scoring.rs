//! Grading of raw subject responses.
//!
//! A [`ScoringFunction`] maps (item, raw response) to a correctness
//! score in [0, 1]. Exact matching, rubric grading, and delegating to
//! an external judge are all implementations of the same seam; the
//! engine does not care which is in use. Exact matching is strictly
//! binary, the other two produce graded scores (the estimator's
//! generalized likelihood handles both).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::bank::Item;
use crate::subject::{Subject, SubjectError};

#[derive(Debug, Error)]
pub enum ScoringError {
    /// The external judge call failed.
    #[error("judge error: {0}")]
    Judge(#[from] SubjectError),
    /// The judge answered, but no score could be extracted.
    #[error("unparseable judge verdict: {0}")]
    Parse(String),
}

/// Maps a raw response to a correctness score in [0, 1].
#[async_trait]
pub trait ScoringFunction: Send + Sync {
    async fn score(&self, item: &Item, response: &str) -> Result<f64, ScoringError>;
}

// =============================================================================
// Exact match
// =============================================================================

/// Binary scorer: 1.0 when the normalized response equals the
/// normalized answer key, 0.0 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatch;

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl ScoringFunction for ExactMatch {
    async fn score(&self, item: &Item, response: &str) -> Result<f64, ScoringError> {
        Ok(if normalize(response) == normalize(&item.answer_key) {
            1.0
        } else {
            0.0
        })
    }
}

// =============================================================================
// Rubric grading
// =============================================================================

/// Graded scorer: the item's answer key is read as a newline-separated
/// list of required elements, and the score is the fraction found in
/// the response (case-insensitive substring match). An empty rubric
/// grades as fully satisfied.
#[derive(Debug, Default, Clone, Copy)]
pub struct RubricGrader;

#[async_trait]
impl ScoringFunction for RubricGrader {
    async fn score(&self, item: &Item, response: &str) -> Result<f64, ScoringError> {
        let required: Vec<&str> = item
            .answer_key
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if required.is_empty() {
            return Ok(1.0);
        }
        let haystack = normalize(response);
        let hits = required
            .iter()
            .filter(|element| haystack.contains(&normalize(element)))
            .count();
        Ok(hits as f64 / required.len() as f64)
    }
}

// =============================================================================
// External judge
// =============================================================================

/// Delegates grading to an external judge behind the [`Subject`]
/// boundary. The judge is prompted for a JSON verdict and the score is
/// clamped to [0, 1]; unparseable verdicts are a [`ScoringError::Parse`]
/// the runner degrades to incorrect.
pub struct ExternalJudge {
    judge: Arc<dyn Subject>,
}

#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    score: f64,
}

impl ExternalJudge {
    pub fn new(judge: Arc<dyn Subject>) -> Self {
        Self { judge }
    }

    fn grading_prompt(item: &Item, response: &str) -> String {
        format!(
            "Grade the response to the task below against the answer key.\n\
             Reply with JSON only: {{\"score\": s}} where s is a number \
             between 0 and 1.\n\n\
             Task:\n{}\n\nAnswer key:\n{}\n\nResponse:\n{}",
            item.prompt, item.answer_key, response
        )
    }
}

#[async_trait]
impl ScoringFunction for ExternalJudge {
    async fn score(&self, item: &Item, response: &str) -> Result<f64, ScoringError> {
        let prompt = Self::grading_prompt(item, response);
        let raw = self.judge.respond(&prompt, None).await?;
        parse_judge_score(&raw)
    }
}

/// Parse a judge verdict: a JSON object with a `score` field, or a bare
/// number as a fallback for judges that skip the JSON wrapper.
pub fn parse_judge_score(raw: &str) -> Result<f64, ScoringError> {
    let json = extract_json(raw);
    if let Ok(verdict) = serde_json::from_str::<JudgeVerdict>(json) {
        if verdict.score.is_finite() {
            return Ok(verdict.score.clamp(0.0, 1.0));
        }
        return Err(ScoringError::Parse(format!(
            "non-finite score: {}",
            verdict.score
        )));
    }
    if let Ok(score) = raw.trim().parse::<f64>() {
        if score.is_finite() {
            return Ok(score.clamp(0.0, 1.0));
        }
    }
    Err(ScoringError::Parse(format!(
        "no score found in judge response: {raw:.60}"
    )))
}

/// Extract the first balanced JSON object from a response (judges often
/// add surrounding prose).
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        let mut depth = 0;
        for (i, c) in remainder.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return &remainder[..=i];
                    }
                }
                _ => {}
            }
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Item;

    fn item(answer_key: &str) -> Item {
        Item::new("i1", "prompt", answer_key, 0.0, 1.0)
    }

    #[tokio::test]
    async fn exact_match_normalizes_case_and_whitespace() {
        let scorer = ExactMatch;
        let it = item("Paris");
        assert_eq!(scorer.score(&it, "  paris ").await.unwrap(), 1.0);
        assert_eq!(scorer.score(&it, "London").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn rubric_grader_scores_fraction_of_elements() {
        let scorer = RubricGrader;
        let it = item("dependency injection\nfactory pattern\nvisitor pattern");
        let score = scorer
            .score(&it, "It uses dependency injection and the factory pattern.")
            .await
            .unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn judge_score_parses_json_with_surrounding_text() {
        let raw = "Sure, here is my grade:\n{\"score\": 0.75}\nHope that helps.";
        assert_eq!(parse_judge_score(raw).unwrap(), 0.75);
    }

    #[test]
    fn judge_score_parses_bare_number_and_clamps() {
        assert_eq!(parse_judge_score("1.4").unwrap(), 1.0);
        assert_eq!(parse_judge_score(" 0.2 ").unwrap(), 0.2);
    }

    #[test]
    fn judge_score_rejects_garbage() {
        assert!(matches!(
            parse_judge_score("the response is quite good"),
            Err(ScoringError::Parse(_))
        ));
    }
}
