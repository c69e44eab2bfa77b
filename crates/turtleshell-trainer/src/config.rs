//! Per-cycle configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use turtleshell_core::crf::CrfTrainer;
use turtleshell_core::features::{DEFAULT_DELTA, FeatureExtractor};
use turtleshell_core::scoring::MetricScale;
use turtleshell_core::selection::{ResidualPolicy, SelectionStrategy, Selector, TieBreak};
use turtleshell_core::{Result, TurtleError};

use crate::store::CycleKey;

/// Configuration for one active-learning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Trajectory seed
    pub seed: u64,
    /// Feature context window radius
    pub delta: usize,
    /// Words moved from the pool per cycle
    pub increment_size: usize,
    /// Cumulative words selected before this cycle
    pub select_size: usize,
    /// CRF training epochs
    pub max_iterations: usize,
    /// CRF initial learning rate
    pub learning_rate: f64,
    /// CRF L2 decay coefficient
    pub l2: f64,
    /// Restrict predictions to grammatical tag sequences
    pub constrained: bool,
    pub residual_policy: ResidualPolicy,
    pub strategy: SelectionStrategy,
    pub tie_break: TieBreak,
    pub metric_scale: MetricScale,
}

impl Default for CycleConfig {
    fn default() -> Self {
        let crf = CrfTrainer::default();
        Self {
            seed: 0,
            delta: DEFAULT_DELTA,
            increment_size: 50,
            select_size: 0,
            max_iterations: crf.max_iterations,
            learning_rate: crf.learning_rate,
            l2: crf.l2,
            constrained: crf.constrained,
            residual_policy: ResidualPolicy::default(),
            strategy: SelectionStrategy::default(),
            tie_break: TieBreak::default(),
            metric_scale: MetricScale::default(),
        }
    }
}

impl CycleConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_delta(mut self, delta: usize) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_increment_size(mut self, increment_size: usize) -> Self {
        self.increment_size = increment_size;
        self
    }

    pub fn with_select_size(mut self, select_size: usize) -> Self {
        self.select_size = select_size;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    pub fn with_residual_policy(mut self, policy: ResidualPolicy) -> Self {
        self.residual_policy = policy;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_metric_scale(mut self, scale: MetricScale) -> Self {
        self.metric_scale = scale;
        self
    }

    /// Check the settings against each other.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::InvalidConfig` for a zero `delta`, a zero
    /// `increment_size` once selection has started, a `select_size` that
    /// is not a multiple of `increment_size`, or a learning rate or L2
    /// coefficient out of range.
    pub fn validate(&self) -> Result<()> {
        if self.delta == 0 {
            return Err(TurtleError::InvalidConfig("delta must be at least 1".into()));
        }
        if self.increment_size == 0 {
            if self.select_size > 0 {
                return Err(TurtleError::InvalidConfig(
                    "increment_size must be at least 1 once selection has started".into(),
                ));
            }
        } else if self.select_size % self.increment_size != 0 {
            return Err(TurtleError::InvalidConfig(format!(
                "select_size {} is not a multiple of increment_size {}",
                self.select_size, self.increment_size
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TurtleError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(TurtleError::InvalidConfig(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }

    /// Store address of the cycle this configuration describes.
    pub fn key(&self) -> CycleKey {
        CycleKey::new(self.seed, self.select_size)
    }

    /// Key of the cycle this one carries forward from. `None` for the
    /// bootstrap cycle, and for a `select_size` below `increment_size`,
    /// which [`validate`](Self::validate) rejects.
    pub fn prior_key(&self) -> Option<CycleKey> {
        if self.select_size == 0 {
            return None;
        }
        self.select_size
            .checked_sub(self.increment_size)
            .map(|prior| CycleKey::new(self.seed, prior))
    }

    /// Configuration of the following cycle in the same trajectory.
    pub fn next(&self) -> Self {
        self.clone()
            .with_select_size(self.select_size + self.increment_size)
    }

    pub fn extractor(&self) -> Result<FeatureExtractor> {
        FeatureExtractor::new(self.delta)
    }

    /// CRF trainer seeded for this cycle.
    pub fn trainer(&self) -> CrfTrainer {
        CrfTrainer::new()
            .with_max_iterations(self.max_iterations)
            .with_learning_rate(self.learning_rate)
            .with_l2(self.l2)
            .with_seed(self.seed ^ self.select_size as u64)
            .with_constrained(self.constrained)
    }

    /// Pool selector seeded for this cycle.
    pub fn selector(&self) -> Selector {
        Selector::new(self.increment_size)
            .with_policy(self.residual_policy)
            .with_strategy(self.strategy)
            .with_tie_break(self.tie_break)
            .with_seed(self.seed ^ self.select_size as u64)
    }
}
