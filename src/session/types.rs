//! Result records for adaptive test runs.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// One scored administration inside a run.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub item_id: String,
    /// Correctness in [0, 1]; binary for exact-match scoring, graded
    /// for rubric/judge scoring.
    pub correctness: f64,
    pub timestamp_ms: i64,
}

/// Ordered record of one subject's administrations. Created at test
/// start, appended during the run, frozen at test end; no item appears
/// twice within a single run.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsePattern {
    subject_id: String,
    records: Vec<ResponseRecord>,
}

impl ResponsePattern {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            records: Vec::new(),
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mean correctness over administered items (0.0 for an empty run).
    pub fn mean_correctness(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|r| r.correctness).sum();
        total / self.records.len() as f64
    }

    pub(crate) fn push(&mut self, item_id: String, correctness: f64) {
        debug_assert!(
            !self.records.iter().any(|r| r.item_id == item_id),
            "item administered twice in one run: {item_id}"
        );
        self.records.push(ResponseRecord {
            item_id,
            correctness,
            timestamp_ms: now_epoch_ms(),
        });
    }
}

/// How a run ended, independent of why it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The stop rule fired normally.
    Completed,
    /// Cooperative cancellation; accumulated data is kept.
    PartialCancelled,
    /// Subject retries exhausted under the abort policy.
    PartialSubjectFailure,
}

/// Why the adaptive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Standard error reached the configured target.
    SeTargetMet,
    /// `n_max` items administered.
    ItemBudgetExhausted,
    /// No unadministered items remain.
    BankExhausted,
    /// Cancellation flag was set.
    Cancelled,
    /// Subject failed permanently under the abort policy.
    SubjectFailure,
}

/// Final ability estimate for one subject.
#[derive(Debug, Clone, Serialize)]
pub struct AbilityEstimate {
    pub subject_id: String,
    /// Latent ability, clipped to the configured range.
    pub theta: f64,
    /// Uncertainty of theta; infinite when nothing was administered.
    pub standard_error: f64,
    /// Item ids in administration order.
    pub items_administered: Vec<String>,
    /// `[theta - z * se, theta + z * se]`.
    pub confidence_interval: (f64, f64),
    pub status: RunStatus,
}

/// Frozen report of one adaptive run.
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub estimate: AbilityEstimate,
    pub pattern: ResponsePattern,
    pub stop_reason: StopReason,
    pub latency_ms: u128,
}

impl TestRun {
    pub fn mean_correctness(&self) -> f64 {
        self.pattern.mean_correctness()
    }
}

/// Qualitative reading of a theta value on the conventional scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityBand {
    WellBelowAverage,
    BelowAverage,
    Average,
    AboveAverage,
    WellAboveAverage,
}

/// Band for a theta value. Coarse, for reports; the confidence interval
/// is the quantitative statement.
pub fn ability_band(theta: f64) -> AbilityBand {
    if theta < -1.5 {
        AbilityBand::WellBelowAverage
    } else if theta < -0.5 {
        AbilityBand::BelowAverage
    } else if theta <= 0.5 {
        AbilityBand::Average
    } else if theta <= 1.5 {
        AbilityBand::AboveAverage
    } else {
        AbilityBand::WellAboveAverage
    }
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
