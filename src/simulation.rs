//! Deterministic simulation harness for adaptive runs.
//!
//! Drives the real runner loop end-to-end with a synthetic subject
//! whose true ability is known: the subject answers each item correctly
//! with the probability the 2PL model assigns at its true theta. Used
//! to validate recovery properties (estimates approach the truth,
//! uncertainty shrinks with more items) without any external calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::bank::ItemBank;
use crate::model;
use crate::scoring::ExactMatch;
use crate::session::{AdaptiveTestRunner, RunnerConfig, RunnerError, TestRun};
use crate::subject::{Subject, SubjectError};

/// Synthetic subject with a known true ability.
///
/// Looks items up by prompt text (the only thing a real subject sees)
/// and returns either the item's answer key or a wrong answer, drawn
/// with the model probability at `true_theta`. Pair with [`ExactMatch`]
/// scoring for faithful binary outcomes.
pub struct SimulatedSubject {
    id: String,
    true_theta: f64,
    by_prompt: HashMap<String, (String, f64, f64)>,
    rng: Mutex<StdRng>,
}

impl SimulatedSubject {
    pub fn new(id: impl Into<String>, true_theta: f64, bank: &ItemBank, seed: u64) -> Self {
        let by_prompt = bank
            .items()
            .iter()
            .map(|item| {
                (
                    item.prompt.clone(),
                    (
                        item.answer_key.clone(),
                        item.discrimination,
                        item.difficulty,
                    ),
                )
            })
            .collect();
        Self {
            id: id.into(),
            true_theta,
            by_prompt,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn true_theta(&self) -> f64 {
        self.true_theta
    }
}

#[async_trait]
impl Subject for SimulatedSubject {
    fn id(&self) -> &str {
        &self.id
    }

    async fn respond(&self, prompt: &str, _context: Option<&str>) -> Result<String, SubjectError> {
        let Some((answer_key, a, b)) = self.by_prompt.get(prompt) else {
            return Err(SubjectError::communication(
                format!("prompt not in simulated bank: {prompt:.40}"),
                false,
            ));
        };
        let p = model::probability(self.true_theta, *a, *b);
        let correct = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_bool(p.clamp(0.0, 1.0))
        };
        Ok(if correct {
            answer_key.clone()
        } else {
            String::from("(no answer)")
        })
    }
}

/// Recovery statistics for one true ability level.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimulationStat {
    pub true_theta: f64,
    /// Mean of (theta_hat - true_theta) across replications.
    pub bias: f64,
    /// Mean squared estimation error.
    pub mse: f64,
    pub mean_se: f64,
    pub mean_items: f64,
}

/// Run `replications` simulated sessions per true theta and aggregate
/// recovery statistics. Seeds are derived per task, so the profile is
/// reproducible.
pub async fn simulate_profile(
    bank: Arc<ItemBank>,
    config: RunnerConfig,
    true_thetas: &[f64],
    replications: usize,
    seed: u64,
) -> Result<Vec<SimulationStat>, RunnerError> {
    let mut stats = Vec::with_capacity(true_thetas.len());

    for (theta_idx, &true_theta) in true_thetas.iter().enumerate() {
        let mut sum_err = 0.0;
        let mut sum_sq_err = 0.0;
        let mut sum_se = 0.0;
        let mut sum_items = 0.0;

        for rep in 0..replications {
            let task_seed = seed
                .wrapping_add(theta_idx as u64 * 10_000)
                .wrapping_add(rep as u64);
            let run = simulate_run(bank.clone(), config.clone(), true_theta, task_seed).await?;

            let err = run.estimate.theta - true_theta;
            sum_err += err;
            sum_sq_err += err * err;
            sum_se += run.estimate.standard_error;
            sum_items += run.estimate.items_administered.len() as f64;
        }

        let n = replications.max(1) as f64;
        stats.push(SimulationStat {
            true_theta,
            bias: sum_err / n,
            mse: sum_sq_err / n,
            mean_se: sum_se / n,
            mean_items: sum_items / n,
        });
    }

    Ok(stats)
}

/// One simulated session through the real runner.
pub async fn simulate_run(
    bank: Arc<ItemBank>,
    mut config: RunnerConfig,
    true_theta: f64,
    seed: u64,
) -> Result<TestRun, RunnerError> {
    config.rng_seed = seed;
    let subject = SimulatedSubject::new(format!("sim-{seed}"), true_theta, &bank, seed);
    let runner = AdaptiveTestRunner::new(bank, config)?;
    runner.execute(&subject, &ExactMatch, None, None).await
}
