//! Cross-subject detection of mislabeled or miscalibrated items.
//!
//! Batch post-processing over finalized runs: for every item, compare
//! each subject's observed correctness with the probability the fitted
//! 2PL model assigns at that subject's ability. Items where the model
//! is consistently wrong (high-ability subjects failing, low-ability
//! subjects succeeding) accumulate large residuals and get flagged as
//! candidate mislabels.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::bank::{BankError, ItemBank};
use crate::model;
use crate::session::TestRun;

/// Configuration for the detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Items with fewer distinct contributing subjects than this are
    /// marked undetermined instead of being judged.
    pub min_subjects: usize,
    /// Flag when the mean squared residual exceeds this.
    pub threshold: f64,
    /// Sigmoid steepness for the heuristic mislabel score.
    pub steepness: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_subjects: 5,
            threshold: 0.3,
            steepness: 4.0,
        }
    }
}

/// One subject's outcome on one item, with the subject's final ability.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub subject_id: String,
    pub subject_theta: f64,
    pub item_id: String,
    pub correctness: f64,
}

/// Flatten finalized runs into per-item outcome tuples, pairing each
/// record with its run's final ability estimate.
pub fn outcomes_from_runs(runs: &[TestRun]) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::new();
    for run in runs {
        for record in run.pattern.records() {
            outcomes.push(ItemOutcome {
                subject_id: run.estimate.subject_id.clone(),
                subject_theta: run.estimate.theta,
                item_id: record.item_id.clone(),
                correctness: record.correctness,
            });
        }
    }
    outcomes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Discrepancy exceeds the threshold.
    Flagged,
    /// Enough data, no anomaly.
    Clear,
    /// Fewer than `min_subjects` contributing subjects.
    Undetermined,
}

/// Per-item residual diagnosis.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDiagnosis {
    pub item_id: String,
    /// Mean squared residual across contributing subjects.
    pub discrepancy_score: f64,
    /// Signed mean residual; negative means subjects underperform what
    /// the model predicts, positive means they overperform.
    pub mean_residual: f64,
    /// Heuristic ranking score in [0, 1]; NOT a calibrated probability
    /// unless separately fit against labeled mislabel data.
    pub mislabel_probability: f64,
    pub contributing_subjects: usize,
    pub verdict: Verdict,
}

/// Flagged item, ready for review.
#[derive(Debug, Clone, Serialize)]
pub struct MislabelFlag {
    pub item_id: String,
    pub discrepancy_score: f64,
    pub mislabel_probability: f64,
    pub contributing_subjects: usize,
}

/// Offline residual analysis over completed runs. Read-only and
/// deterministic: identical input yields identical scores.
#[derive(Debug, Clone, Default)]
pub struct MislabelDetector {
    config: DetectorConfig,
}

impl MislabelDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Diagnose every item that appears in the outcomes, in item-id
    /// order. Outcomes referencing items missing from the bank are an
    /// integrity error.
    pub fn analyze(
        &self,
        outcomes: &[ItemOutcome],
        bank: &ItemBank,
    ) -> Result<Vec<ItemDiagnosis>, BankError> {
        let mut by_item: BTreeMap<&str, Vec<&ItemOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            by_item.entry(&outcome.item_id).or_default().push(outcome);
        }

        let mut diagnoses = Vec::with_capacity(by_item.len());
        for (item_id, group) in by_item {
            let item = bank.require(item_id)?;

            let subjects: HashSet<&str> =
                group.iter().map(|o| o.subject_id.as_str()).collect();
            let contributing_subjects = subjects.len();

            let mut sum_sq = 0.0;
            let mut sum_signed = 0.0;
            for outcome in &group {
                let expected = model::probability(
                    outcome.subject_theta,
                    item.discrimination,
                    item.difficulty,
                );
                let residual = outcome.correctness - expected;
                sum_sq += residual * residual;
                sum_signed += residual;
            }
            let n = group.len() as f64;
            let discrepancy_score = sum_sq / n;
            let mean_residual = sum_signed / n;

            let verdict = if contributing_subjects < self.config.min_subjects {
                Verdict::Undetermined
            } else if discrepancy_score > self.config.threshold {
                Verdict::Flagged
            } else {
                Verdict::Clear
            };

            diagnoses.push(ItemDiagnosis {
                item_id: item_id.to_string(),
                discrepancy_score,
                mean_residual,
                mislabel_probability: sigmoid(
                    self.config.steepness * (discrepancy_score - self.config.threshold),
                ),
                contributing_subjects,
                verdict,
            });
        }
        Ok(diagnoses)
    }

    /// Flagged items only, most suspicious first.
    pub fn flags(&self, diagnoses: &[ItemDiagnosis]) -> Vec<MislabelFlag> {
        let mut flags: Vec<MislabelFlag> = diagnoses
            .iter()
            .filter(|d| d.verdict == Verdict::Flagged)
            .map(|d| MislabelFlag {
                item_id: d.item_id.clone(),
                discrepancy_score: d.discrepancy_score,
                mislabel_probability: d.mislabel_probability,
                contributing_subjects: d.contributing_subjects,
            })
            .collect();
        flags.sort_by(|a, b| {
            b.discrepancy_score
                .partial_cmp(&a.discrepancy_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        flags
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
