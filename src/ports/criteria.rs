//! Detection and resolution contracts

use crate::domain::Direction;

/// Decides whether the series is currently deviating, and which way it
/// should revert. Stateless across calls.
pub trait DeviationDetector: Send + Sync {
    fn detect(&self, value: f64, mean: f64, volatility: f64) -> Option<Direction>;
}

/// Decides whether an active deviation has come back close enough to the mean
pub trait ReversionCriterion: Send + Sync {
    fn is_reverted(&self, zscore: f64) -> bool;
}

/// Decides whether an active deviation should be abandoned
pub trait FailureCriterion: Send + Sync {
    /// `duration` is the number of bars the event has been alive,
    /// counting both the opening bar and the current bar.
    fn is_failed(&self, duration: usize, zscore: f64) -> bool;
}
