//! Deterministic doubles for the estimator and criterion ports
//!
//! Useful for pinning the engine's state machine independently of any
//! estimation algorithm.

use super::{MeanEstimator, ReversionCriterion, VolatilityEstimator};

/// Mean estimator that always reports the same level
#[derive(Debug, Clone)]
pub struct ConstantMean {
    level: f64,
    min_periods: usize,
    count: usize,
}

impl ConstantMean {
    pub fn new(level: f64) -> Self {
        Self {
            level,
            min_periods: 1,
            count: 0,
        }
    }

    /// Builder method to delay readiness
    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }
}

impl MeanEstimator for ConstantMean {
    fn update(&mut self, _value: f64) -> f64 {
        self.count += 1;
        self.level
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn value(&self) -> f64 {
        self.level
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

/// Volatility estimator that always reports the same dispersion
#[derive(Debug, Clone)]
pub struct ConstantVolatility {
    level: f64,
    min_periods: usize,
    count: usize,
}

impl ConstantVolatility {
    pub fn new(level: f64) -> Self {
        Self {
            level,
            min_periods: 1,
            count: 0,
        }
    }

    /// Builder method to delay readiness
    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }
}

impl VolatilityEstimator for ConstantVolatility {
    fn update(&mut self, _value: f64) -> f64 {
        self.count += 1;
        self.level
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn value(&self) -> f64 {
        self.level
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

/// Reversion criterion that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRevert;

impl ReversionCriterion for NeverRevert {
    fn is_reverted(&self, _zscore: f64) -> bool {
        false
    }
}
