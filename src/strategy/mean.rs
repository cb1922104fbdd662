//! Online Mean Estimators
//!
//! Three interchangeable ways to track a series' central value:
//! - `WindowedMean`: arithmetic mean over a ring buffer (running sum, O(1))
//! - `EwmaMean`: exponentially weighted mean, `alpha = 2 / (span + 1)`
//! - `KalmanMean`: constant-level Kalman filter
//!
//! Non-finite observations are ignored and do not count towards readiness.

use std::collections::VecDeque;

use crate::error::Result;
use crate::ports::MeanEstimator;
use crate::strategy::params::{EwmaMeanParams, KalmanParams, WindowedMeanParams};

/// Arithmetic mean over the last `window` observations
#[derive(Debug, Clone)]
pub struct WindowedMean {
    window: usize,
    min_periods: usize,
    buffer: VecDeque<f64>,
    sum: f64,
    count: usize,
}

impl WindowedMean {
    pub fn new(params: &WindowedMeanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            window: params.window,
            min_periods: params.min_periods(),
            buffer: VecDeque::with_capacity(params.window + 1),
            sum: 0.0,
            count: 0,
        })
    }
}

impl MeanEstimator for WindowedMean {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.value();
        }
        self.buffer.push_back(value);
        self.sum += value;
        if self.buffer.len() > self.window {
            if let Some(old) = self.buffer.pop_front() {
                self.sum -= old;
            }
        }
        self.count += 1;
        self.value()
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.sum = 0.0;
        self.count = 0;
    }

    fn value(&self) -> f64 {
        if self.buffer.is_empty() {
            f64::NAN
        } else {
            self.sum / self.buffer.len() as f64
        }
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "windowed"
    }
}

/// Exponentially weighted moving average
#[derive(Debug, Clone)]
pub struct EwmaMean {
    alpha: f64,
    min_periods: usize,
    mean: Option<f64>,
    count: usize,
}

impl EwmaMean {
    pub fn new(params: &EwmaMeanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            alpha: 2.0 / (params.span + 1.0),
            min_periods: params.min_periods,
            mean: None,
            count: 0,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl MeanEstimator for EwmaMean {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.value();
        }
        let next = match self.mean {
            None => value,
            Some(m) => m + self.alpha * (value - m),
        };
        self.mean = Some(next);
        self.count += 1;
        next
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.mean = None;
        self.count = 0;
    }

    fn value(&self) -> f64 {
        self.mean.unwrap_or(f64::NAN)
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "ewma"
    }
}

/// Kalman filter over a latent constant level
///
/// Predict `P = P + q`, gain `K = P / (P + r)`, update `x += K (y - x)`,
/// `P = (1 - K) P`.
#[derive(Debug, Clone)]
pub struct KalmanMean {
    process_var: f64,
    obs_var: f64,
    init_var: f64,
    init_value: Option<f64>,
    min_periods: usize,
    level: Option<f64>,
    variance: f64,
    count: usize,
}

impl KalmanMean {
    pub fn new(params: &KalmanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            process_var: params.process_var,
            obs_var: params.obs_var,
            init_var: params.init_var,
            init_value: params.init_value,
            min_periods: params.min_periods,
            level: params.init_value,
            variance: params.init_var,
            count: 0,
        })
    }

    /// Current state variance P
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl MeanEstimator for KalmanMean {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.value();
        }
        let x = self.level.unwrap_or(value);
        let p_pred = self.variance + self.process_var;
        let gain = p_pred / (p_pred + self.obs_var);
        let next = x + gain * (value - x);
        self.variance = (1.0 - gain) * p_pred;
        self.level = Some(next);
        self.count += 1;
        next
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.level = self.init_value;
        self.variance = self.init_var;
        self.count = 0;
    }

    fn value(&self) -> f64 {
        self.level.unwrap_or(f64::NAN)
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "kalman"
    }
}
