//! Online estimator contracts

/// Online estimate of a series' central value
pub trait MeanEstimator: Send {
    /// Feed one observation and return the updated estimate
    fn update(&mut self, value: f64) -> f64;

    /// True once `observation_count() >= min_periods`
    fn is_ready(&self) -> bool;

    /// Return to the freshly constructed state
    fn reset(&mut self);

    /// Current estimate (NaN before the first observation)
    fn value(&self) -> f64;

    /// Observations consumed since construction or the last reset
    fn observation_count(&self) -> usize;

    /// Short algorithm name for logs and diagnostics
    fn name(&self) -> &'static str;
}

/// Online estimate of a series' dispersion
///
/// Whether the input is a raw value or a return is decided by the caller.
pub trait VolatilityEstimator: Send {
    /// Feed one observation and return the updated volatility
    fn update(&mut self, value: f64) -> f64;

    /// True once `observation_count() >= min_periods`
    fn is_ready(&self) -> bool;

    /// Return to the freshly constructed state
    fn reset(&mut self);

    /// Current volatility (NaN before the first observation)
    fn value(&self) -> f64;

    /// Observations consumed since construction or the last reset
    fn observation_count(&self) -> usize;

    /// Short algorithm name for logs and diagnostics
    fn name(&self) -> &'static str;
}
