//! Information-maximizing item selection.
//!
//! Given the current ability estimate, picks the unadministered item
//! with the highest Fisher information, breaking ties by lowest
//! exposure count and then lowest id so runs are reproducible. The
//! randomesque variant draws uniformly among the top k to spread
//! exposure across many runs.

use std::cmp::Ordering;
use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::bank::{Item, ItemBank};
use crate::model;

/// Next-item selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Deterministic maximum-information selection.
    MaxInfo,
    /// Uniform draw among the `k` most informative remaining items.
    RandomesqueTopK { k: usize },
}

impl SelectionStrategy {
    /// Randomesque selection with the conventional window of five.
    pub fn randomesque() -> Self {
        Self::RandomesqueTopK { k: 5 }
    }
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::MaxInfo
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// Every item in the bank has already been administered. The runner
    /// treats this as a normal stop condition, not a failure.
    #[error("item bank exhausted")]
    Exhausted,
}

/// Select the next item to administer at ability `theta`.
///
/// The first item of a run goes through the same path at `theta_start`;
/// there is no special-casing.
pub fn select_next<'a>(
    bank: &'a ItemBank,
    administered: &HashSet<String>,
    theta: f64,
    strategy: SelectionStrategy,
    rng: &mut StdRng,
) -> Result<&'a Item, SelectorError> {
    let mut candidates: Vec<(&Item, f64, u64)> = bank
        .items()
        .iter()
        .filter(|item| !administered.contains(&item.id))
        .map(|item| {
            let info = model::information(theta, item.discrimination, item.difficulty);
            (item, info, bank.exposure_count(&item.id))
        })
        .collect();

    if candidates.is_empty() {
        return Err(SelectorError::Exhausted);
    }

    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });

    match strategy {
        SelectionStrategy::MaxInfo => Ok(candidates[0].0),
        SelectionStrategy::RandomesqueTopK { k } => {
            let k = k.max(1).min(candidates.len());
            Ok(candidates[rng.gen_range(0..k)].0)
        }
    }
}
