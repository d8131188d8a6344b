//! Model weights shared between prediction and learning.
//!
//! Predictions read an immutable snapshot (`Arc<ModelWeights>`); the learning
//! system computes a complete replacement and swaps it in under a writer lock,
//! so a reader never observes a half-applied update.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{EngineError, Result};

const SUM_TOLERANCE: f64 = 1e-6;
/// Floor applied before renormalising so no model is switched off entirely.
pub const MIN_WEIGHT: f64 = 0.01;

/// Blend weights for the four probability sources. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelWeights {
    pub statistical: f64,
    pub contextual: f64,
    pub machine_learning: f64,
    pub market: f64,
}

impl Default for ModelWeights {
    fn default() -> Self {
        ModelWeights {
            statistical: 0.25,
            contextual: 0.25,
            machine_learning: 0.35,
            market: 0.15,
        }
    }
}

impl ModelWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.statistical,
            self.contextual,
            self.machine_learning,
            self.market,
        ]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        ModelWeights {
            statistical: values[0],
            contextual: values[1],
            machine_learning: values[2],
            market: values[3],
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Floor every weight at [`MIN_WEIGHT`] and rescale to sum to 1.
    /// Non-finite input collapses to the defaults.
    pub fn normalized(&self) -> Self {
        let raw = self.as_array();
        if raw.iter().any(|w| !w.is_finite()) {
            return ModelWeights::default();
        }
        let floored = raw.map(|w| w.max(MIN_WEIGHT));
        let total: f64 = floored.iter().sum();
        Self::from_array(floored.map(|w| w / total))
    }

    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::Config(
                "layer weights must be finite and non-negative".into(),
            ));
        }
        if (self.sum() - 1.0).abs() > SUM_TOLERANCE {
            return Err(EngineError::Config(format!(
                "layer weights must sum to 1, got {:.6}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Lock-guarded holder for the current weights. Owned by the orchestrator and
/// handed (via `Arc`) to whoever predicts or learns.
#[derive(Debug)]
pub struct WeightStore {
    current: RwLock<Arc<ModelWeights>>,
    /// Serialises writers; readers never take it.
    writer: Mutex<()>,
}

impl WeightStore {
    pub fn new(initial: ModelWeights) -> Self {
        WeightStore {
            current: RwLock::new(Arc::new(initial.normalized())),
            writer: Mutex::new(()),
        }
    }

    /// Stable snapshot for the duration of one prediction.
    pub fn snapshot(&self) -> Arc<ModelWeights> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the weights with a normalised copy of `next`.
    pub fn replace(&self, next: ModelWeights) -> Arc<ModelWeights> {
        let _writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.swap(next)
    }

    /// Compute new weights from the current ones and swap them in. Only one
    /// update runs at a time; readers keep seeing the previous snapshot until
    /// the swap.
    pub fn update_with<F>(&self, f: F) -> Arc<ModelWeights>
    where
        F: FnOnce(&ModelWeights) -> ModelWeights,
    {
        let _writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let base = self.snapshot();
        self.swap(f(&base))
    }

    fn swap(&self, next: ModelWeights) -> Arc<ModelWeights> {
        let next = Arc::new(next.normalized());
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&next);
        next
    }
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new(ModelWeights::default())
    }
}
