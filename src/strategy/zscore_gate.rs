//! Z-Score Gate
//!
//! Deviation detector built on the z-score of a value against externally
//! estimated mean and volatility.
//!
//! Z-Score Formula: z = (value - mean) / volatility
//!
//! A value far below its mean is expected to revert UP, one far above is
//! expected to revert DOWN.

use crate::domain::Direction;
use crate::error::Result;
use crate::ports::DeviationDetector;
use crate::strategy::params::ZScoreDetectorParams;

/// z-score of `value`, or None when volatility is unusable or the result
/// is not finite
pub fn zscore(value: f64, mean: f64, volatility: f64) -> Option<f64> {
    if !(volatility.is_finite() && volatility > 0.0) {
        return None;
    }
    let z = (value - mean) / volatility;
    z.is_finite().then_some(z)
}

/// Result of z-score calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreResult {
    /// Current z-score value
    pub z_score: f64,
    /// Mean used in calculation
    pub mean: f64,
    /// Volatility used in calculation
    pub volatility: f64,
    /// Current value
    pub value: f64,
}

impl ZScoreResult {
    /// Below the negative threshold
    pub fn is_oversold(&self, threshold: f64) -> bool {
        self.z_score <= -threshold
    }

    /// Above the positive threshold
    pub fn is_overbought(&self, threshold: f64) -> bool {
        self.z_score >= threshold
    }

    /// Absolute distance from mean
    pub fn abs_move(&self) -> f64 {
        (self.value - self.mean).abs()
    }
}

/// Stateless z-score threshold detector
#[derive(Debug, Clone)]
pub struct ZScoreGate {
    threshold: f64,
    min_abs_move: Option<f64>,
}

impl ZScoreGate {
    pub fn new(params: &ZScoreDetectorParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            threshold: params.threshold,
            min_abs_move: params.min_abs_move,
        })
    }

    /// Get the z-threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, value: f64, mean: f64, volatility: f64) -> Option<ZScoreResult> {
        zscore(value, mean, volatility).map(|z_score| ZScoreResult {
            z_score,
            mean,
            volatility,
            value,
        })
    }
}

impl DeviationDetector for ZScoreGate {
    fn detect(&self, value: f64, mean: f64, volatility: f64) -> Option<Direction> {
        let result = self.evaluate(value, mean, volatility)?;
        if let Some(min_move) = self.min_abs_move {
            if result.abs_move() < min_move {
                return None;
            }
        }
        if result.is_oversold(self.threshold) {
            Some(Direction::Up)
        } else if result.is_overbought(self.threshold) {
            Some(Direction::Down)
        } else {
            None
        }
    }
}
