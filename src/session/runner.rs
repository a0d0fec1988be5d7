//! Adaptive test execution.
//!
//! One run walks the state machine
//! `INIT -> SELECTING -> ADMINISTERING -> SCORING -> UPDATING ->
//! {SELECTING | STOPPED} -> FINALIZED`:
//! select the most informative remaining item, call the external
//! subject (bounded by a timeout and retries), grade the raw response,
//! fold the outcome into the running ability estimate, and loop until a
//! stop condition holds. Execution within a run is strictly sequential
//! because each selection depends on the estimate updated from the
//! previous outcome; independent subjects may run concurrently against
//! a shared bank.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::bank::{BankError, Item, ItemBank};
use crate::estimator::{estimate, EstimateError, EstimatorConfig};
use crate::scoring::ScoringFunction;
use crate::selector::{select_next, SelectionStrategy, SelectorError};
use crate::subject::{Subject, SubjectError};

use super::observer::{ItemEvent, RunObserver};
use super::types::{AbilityEstimate, ResponsePattern, RunStatus, StopReason, TestRun};

// =============================================================================
// Configuration
// =============================================================================

/// What to do when a subject call fails after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record correctness 0 for the item and keep going.
    TreatAsIncorrect,
    /// Stop immediately with status `PartialSubjectFailure`.
    AbortTest,
}

/// Configuration for one adaptive run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Initial ability estimate.
    pub theta_start: f64,
    /// Never stop on the SE target before this many items.
    pub n_min: usize,
    /// Hard cap on administered items.
    pub n_max: usize,
    /// Stop once the standard error falls to this level (after n_min).
    /// Zero makes the target unreachable, so only n_max or exhaustion
    /// stop the run.
    pub se_target: f64,
    /// Timeout for a single subject call.
    pub subject_timeout: Duration,
    /// Retries after the initial attempt for retryable failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub strategy: SelectionStrategy,
    pub estimator: EstimatorConfig,
    /// z-multiplier for the confidence interval.
    pub ci_z: f64,
    /// Seed for randomesque selection; fixed default keeps runs
    /// reproducible.
    pub rng_seed: u64,
    /// Optional task-level context passed to every subject call.
    pub subject_context: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            theta_start: 0.0,
            n_min: 10,
            n_max: 100,
            se_target: 0.3,
            subject_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            failure_policy: FailurePolicy::TreatAsIncorrect,
            strategy: SelectionStrategy::MaxInfo,
            estimator: EstimatorConfig::default(),
            ci_z: 1.96,
            rng_seed: 1337,
            subject_context: None,
        }
    }
}

impl RunnerConfig {
    fn validate(&self) -> Result<(), RunnerError> {
        if self.n_max == 0 {
            return Err(RunnerError::InvalidConfig("n_max must be >= 1".into()));
        }
        if self.n_min > self.n_max {
            return Err(RunnerError::InvalidConfig(format!(
                "n_min must be <= n_max ({} > {})",
                self.n_min, self.n_max
            )));
        }
        if !self.se_target.is_finite() || self.se_target < 0.0 {
            return Err(RunnerError::InvalidConfig(format!(
                "se_target must be >= 0, got {}",
                self.se_target
            )));
        }
        if self.subject_timeout.is_zero() {
            return Err(RunnerError::InvalidConfig(
                "subject_timeout must be positive".into(),
            ));
        }
        if !self.ci_z.is_finite() || self.ci_z <= 0.0 {
            return Err(RunnerError::InvalidConfig(format!(
                "ci_z must be positive, got {}",
                self.ci_z
            )));
        }
        if let SelectionStrategy::RandomesqueTopK { k } = self.strategy {
            if k == 0 {
                return Err(RunnerError::InvalidConfig(
                    "randomesque k must be >= 1".into(),
                ));
            }
        }
        self.estimator.validate().map_err(RunnerError::InvalidConfig)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Programmer errors only. Operational failures (timeouts, flaky
/// subjects, exhausted banks) degrade to a statused result instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid runner configuration: {0}")]
    InvalidConfig(String),
    /// The bank lost an item mid-run; banks must not be mutated while
    /// runs are in flight.
    #[error(transparent)]
    Bank(#[from] BankError),
}

impl From<EstimateError> for RunnerError {
    fn from(err: EstimateError) -> Self {
        match err {
            EstimateError::Bank(e) => RunnerError::Bank(e),
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs one subject through an adaptive test against a shared bank.
pub struct AdaptiveTestRunner {
    bank: Arc<ItemBank>,
    config: RunnerConfig,
}

impl AdaptiveTestRunner {
    pub fn new(bank: Arc<ItemBank>, config: RunnerConfig) -> Result<Self, RunnerError> {
        config.validate()?;
        Ok(Self { bank, config })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute the adaptive loop to completion.
    ///
    /// The cancel flag is checked once per iteration, at the top of the
    /// loop (equivalently: after every UPDATING step); when set, the
    /// run returns status `PartialCancelled` with everything
    /// accumulated so far. Observer failures are logged, never fatal.
    pub async fn execute(
        &self,
        subject: &dyn Subject,
        scorer: &dyn ScoringFunction,
        cancel_flag: Option<&AtomicBool>,
        observer: Option<&dyn RunObserver>,
    ) -> Result<TestRun, RunnerError> {
        let start_time = Instant::now();
        let (lo, hi) = self.config.estimator.theta_range;

        let mut rng = StdRng::seed_from_u64(self.config.rng_seed);
        let mut pattern = ResponsePattern::new(subject.id());
        let mut administered: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut theta = self.config.theta_start.clamp(lo, hi);
        let mut standard_error = f64::INFINITY;
        let mut status = RunStatus::Completed;

        let stop_reason = 'run: loop {
            if let Some(flag) = cancel_flag {
                if flag.load(AtomicOrdering::Relaxed) {
                    status = RunStatus::PartialCancelled;
                    break 'run StopReason::Cancelled;
                }
            }

            let n = order.len();
            if n >= self.config.n_max {
                break 'run StopReason::ItemBudgetExhausted;
            }
            if n >= self.config.n_min && standard_error <= self.config.se_target {
                break 'run StopReason::SeTargetMet;
            }

            // SELECTING
            let item = match select_next(
                &self.bank,
                &administered,
                theta,
                self.config.strategy,
                &mut rng,
            ) {
                Ok(item) => item.clone(),
                Err(SelectorError::Exhausted) => break 'run StopReason::BankExhausted,
            };

            // ADMINISTERING
            let response = match self.administer(subject, &item).await {
                Ok(raw) => Some(raw),
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::TreatAsIncorrect => {
                        warn!(
                            item_id = %item.id,
                            code = err.code(),
                            error = %err,
                            "subject failed after retries; recording as incorrect"
                        );
                        None
                    }
                    FailurePolicy::AbortTest => {
                        warn!(
                            item_id = %item.id,
                            code = err.code(),
                            error = %err,
                            "subject failed after retries; aborting test"
                        );
                        status = RunStatus::PartialSubjectFailure;
                        break 'run StopReason::SubjectFailure;
                    }
                },
            };

            // SCORING
            let correctness = match response {
                Some(raw) => match scorer.score(&item, &raw).await {
                    Ok(score) => score.clamp(0.0, 1.0),
                    Err(err) => {
                        warn!(
                            item_id = %item.id,
                            error = %err,
                            "scoring failed; recording as incorrect"
                        );
                        0.0
                    }
                },
                None => 0.0,
            };

            // UPDATING
            pattern.push(item.id.clone(), correctness);
            self.bank.record_exposure(&item.id);
            administered.insert(item.id.clone());
            order.push(item.id.clone());

            let est = estimate(&pattern, &self.bank, &self.config.estimator)?;
            theta = est.theta;
            standard_error = est.standard_error;

            debug!(
                item_id = %item.id,
                correctness,
                theta,
                standard_error,
                n = order.len(),
                "item administered"
            );

            if let Some(observer) = observer {
                let event = ItemEvent {
                    subject_id: subject.id().to_string(),
                    item_id: item.id.clone(),
                    index: order.len(),
                    correctness,
                    theta,
                    standard_error,
                };
                if let Err(err) = observer.on_item(event).await {
                    warn!(error = %err, "run observer failed");
                }
            }
        };

        // FINALIZED
        let estimate = AbilityEstimate {
            subject_id: subject.id().to_string(),
            theta,
            standard_error,
            items_administered: order,
            confidence_interval: (
                theta - self.config.ci_z * standard_error,
                theta + self.config.ci_z * standard_error,
            ),
            status,
        };

        Ok(TestRun {
            estimate,
            pattern,
            stop_reason,
            latency_ms: start_time.elapsed().as_millis(),
        })
    }

    /// One ADMINISTERING step: timeout-bounded subject call with
    /// bounded retries and exponential backoff. Non-retryable errors
    /// short-circuit.
    async fn administer(&self, subject: &dyn Subject, item: &Item) -> Result<String, SubjectError> {
        let context = self.config.subject_context.as_deref();

        for attempt in 0..=self.config.max_retries {
            let outcome = timeout(self.config.subject_timeout, subject.respond(&item.prompt, context)).await;
            let err = match outcome {
                Ok(Ok(raw)) => return Ok(raw),
                Ok(Err(err)) => err,
                Err(_) => SubjectError::Timeout(self.config.subject_timeout),
            };

            if !err.is_retryable() || attempt == self.config.max_retries {
                return Err(err);
            }

            let delay = backoff_delay(self.config.retry_base_delay, attempt);
            debug!(
                item_id = %item.id,
                attempt,
                code = err.code(),
                delay_ms = delay.as_millis() as u64,
                "retrying subject call"
            );
            sleep(delay).await;
        }

        // Loop always returns on the last attempt.
        Err(SubjectError::communication("retry loop exhausted", false))
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
