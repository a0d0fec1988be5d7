//! Calibrated item bank shared across adaptive runs.
//!
//! The bank is built once, validated at insertion, and then shared
//! read-only between concurrently running subjects. Exposure counts are
//! the only cross-run mutable state; they live behind the injectable
//! [`ExposureStore`] seam so a multi-process deployment can swap in a
//! shared counter service without touching selection logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum BankError {
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("duplicate item id: {0}")]
    DuplicateItem(String),
    #[error("invalid parameters for item {id}: {reason}")]
    InvalidItemParameter { id: String, reason: String },
}

// =============================================================================
// Items
// =============================================================================

/// A calibrated test item.
///
/// Serializes to the logical bank schema
/// `{id, prompt, answer_key, difficulty, discrimination, domain?}` and
/// round-trips losslessly through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier, unique within a bank.
    pub id: String,
    /// Task text shown to the subject.
    pub prompt: String,
    /// Expected answer text or grading rubric; interpreted by the
    /// scoring function, opaque to the engine.
    pub answer_key: String,
    /// Difficulty `b`: the ability at which the correct-response
    /// probability is 50%. Conventionally in -3..3.
    pub difficulty: f64,
    /// Discrimination `a`: how sharply the item separates ability
    /// levels. Must be strictly positive.
    pub discrimination: f64,
    /// Optional domain tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        answer_key: impl Into<String>,
        difficulty: f64,
        discrimination: f64,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            answer_key: answer_key.into(),
            difficulty,
            discrimination,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

// =============================================================================
// Exposure counters
// =============================================================================

/// Counter store for item exposure across runs.
///
/// Counts are a soft tie-breaking heuristic: implementations may be
/// exact (the in-process default) or best-effort/approximate (an
/// external shared service); selection tolerates staleness.
pub trait ExposureStore: Send + Sync {
    /// Record one administration of the item.
    fn record(&self, item_id: &str);
    /// Current exposure count, best effort.
    fn count(&self, item_id: &str) -> u64;
}

/// In-process store with exact, mutex-guarded counts.
#[derive(Debug, Default)]
pub struct InProcessExposureStore {
    counts: Mutex<HashMap<String, u64>>,
}

impl ExposureStore for InProcessExposureStore {
    fn record(&self, item_id: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(item_id.to_string()).or_insert(0) += 1;
    }

    fn count(&self, item_id: &str) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(item_id).copied().unwrap_or(0)
    }
}

// =============================================================================
// Bank
// =============================================================================

/// Bounds enforced on item parameters at insertion.
#[derive(Debug, Clone)]
pub struct BankConfig {
    /// Accepted difficulty range. Items outside are rejected up front
    /// rather than skewing selection later.
    pub difficulty_bounds: (f64, f64),
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            difficulty_bounds: (-4.0, 4.0),
        }
    }
}

/// Holds calibrated items plus their exposure counters.
pub struct ItemBank {
    items: Vec<Item>,
    index: HashMap<String, usize>,
    exposure: Arc<dyn ExposureStore>,
    config: BankConfig,
}

impl std::fmt::Debug for ItemBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemBank")
            .field("items", &self.items)
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ItemBank {
    pub fn new() -> Self {
        Self::with_config(BankConfig::default())
    }

    pub fn with_config(config: BankConfig) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            exposure: Arc::new(InProcessExposureStore::default()),
            config,
        }
    }

    /// Swap in an external counter store (e.g. shared across processes).
    pub fn with_exposure_store(mut self, store: Arc<dyn ExposureStore>) -> Self {
        self.exposure = store;
        self
    }

    /// Build a bank from a deserialized item list, validating each item.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self, BankError> {
        let mut bank = Self::new();
        for item in items {
            bank.insert(item)?;
        }
        Ok(bank)
    }

    /// Insert a calibrated item. Fails fast on duplicate ids,
    /// non-positive discrimination, or out-of-bounds difficulty.
    pub fn insert(&mut self, item: Item) -> Result<(), BankError> {
        if self.index.contains_key(&item.id) {
            return Err(BankError::DuplicateItem(item.id));
        }
        if !item.discrimination.is_finite() || item.discrimination <= 0.0 {
            return Err(BankError::InvalidItemParameter {
                id: item.id,
                reason: format!(
                    "discrimination must be strictly positive, got {}",
                    item.discrimination
                ),
            });
        }
        let (lo, hi) = self.config.difficulty_bounds;
        if !item.difficulty.is_finite() || item.difficulty < lo || item.difficulty > hi {
            return Err(BankError::InvalidItemParameter {
                id: item.id,
                reason: format!(
                    "difficulty must lie in [{lo}, {hi}], got {}",
                    item.difficulty
                ),
            });
        }
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.index.get(item_id).map(|&i| &self.items[i])
    }

    /// Like [`get`](Self::get) but treats absence as an integrity error.
    pub fn require(&self, item_id: &str) -> Result<&Item, BankError> {
        self.get(item_id)
            .ok_or_else(|| BankError::ItemNotFound(item_id.to_string()))
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn record_exposure(&self, item_id: &str) {
        self.exposure.record(item_id);
    }

    pub fn exposure_count(&self, item_id: &str) -> u64 {
        self.exposure.count(item_id)
    }
}

impl Default for ItemBank {
    fn default() -> Self {
        Self::new()
    }
}
