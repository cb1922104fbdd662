//! Online Volatility Estimators
//!
//! - `WindowedStd`: ring buffer with running sum and sum of squares
//! - `EwmVolatility`: exponentially weighted variance
//! - `Garch11`: GARCH(1,1) conditional variance,
//!   `sigma2_t = omega + alpha * r_{t-1}^2 + beta * sigma2_{t-1}`
//!
//! Every output is floored at `min_volatility`. Non-finite observations are
//! ignored.

use std::collections::VecDeque;

use crate::error::Result;
use crate::ports::VolatilityEstimator;
use crate::strategy::params::{EwmVolatilityParams, GarchParams, WindowedStdParams};

/// Rolling standard deviation, O(1) per update
#[derive(Debug, Clone)]
pub struct WindowedStd {
    window: usize,
    min_periods: usize,
    ddof: usize,
    min_volatility: f64,
    buffer: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    count: usize,
    current: f64,
}

impl WindowedStd {
    pub fn new(params: &WindowedStdParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            window: params.window,
            min_periods: params.min_periods(),
            ddof: params.ddof,
            min_volatility: params.min_volatility,
            buffer: VecDeque::with_capacity(params.window + 1),
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
            current: f64::NAN,
        })
    }

    fn compute(&self) -> f64 {
        let n = self.buffer.len();
        if n <= self.ddof {
            return self.min_volatility;
        }
        let mean = self.sum / n as f64;
        // Cancellation can push this marginally below zero
        let variance = ((self.sum_sq - self.sum * mean) / (n - self.ddof) as f64).max(0.0);
        variance.sqrt().max(self.min_volatility)
    }
}

impl VolatilityEstimator for WindowedStd {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.current;
        }
        self.buffer.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        if self.buffer.len() > self.window {
            if let Some(old) = self.buffer.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        self.count += 1;
        self.current = self.compute();
        self.current
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.count = 0;
        self.current = f64::NAN;
    }

    fn value(&self) -> f64 {
        self.current
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "windowed_std"
    }
}

/// Exponentially weighted volatility
#[derive(Debug, Clone)]
pub struct EwmVolatility {
    alpha: f64,
    min_periods: usize,
    demean: bool,
    min_volatility: f64,
    mean: f64,
    variance: f64,
    count: usize,
}

impl EwmVolatility {
    pub fn new(params: &EwmVolatilityParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            alpha: 2.0 / (params.span + 1.0),
            min_periods: params.min_periods,
            demean: params.demean,
            min_volatility: params.min_volatility,
            mean: 0.0,
            variance: 0.0,
            count: 0,
        })
    }
}

impl VolatilityEstimator for EwmVolatility {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.value();
        }
        if self.demean {
            if self.count == 0 {
                self.mean = value;
                self.variance = 0.0;
            } else {
                let delta = value - self.mean;
                self.mean += self.alpha * delta;
                self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * delta * delta);
            }
        } else if self.count == 0 {
            self.variance = value * value;
        } else {
            self.variance = (1.0 - self.alpha) * self.variance + self.alpha * value * value;
        }
        self.count += 1;
        self.value()
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.mean = 0.0;
        self.variance = 0.0;
        self.count = 0;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.variance.max(0.0).sqrt().max(self.min_volatility)
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "ewm"
    }
}

/// GARCH(1,1) volatility filter with fixed parameters
#[derive(Debug, Clone)]
pub struct Garch11 {
    omega: f64,
    alpha: f64,
    beta: f64,
    init_sigma2: Option<f64>,
    min_periods: usize,
    min_volatility: f64,
    sigma2: Option<f64>,
    last_obs: f64,
    count: usize,
}

impl Garch11 {
    pub fn new(params: &GarchParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            omega: params.omega,
            alpha: params.alpha,
            beta: params.beta,
            init_sigma2: params.init_sigma2,
            min_periods: params.min_periods,
            min_volatility: params.min_volatility,
            sigma2: None,
            last_obs: 0.0,
            count: 0,
        })
    }

    /// Current conditional variance
    pub fn sigma2(&self) -> Option<f64> {
        self.sigma2
    }

    /// Long-run variance `omega / (1 - alpha - beta)`, when stationary
    pub fn long_run_variance(&self) -> Option<f64> {
        let persistence = self.alpha + self.beta;
        (persistence < 1.0).then(|| self.omega / (1.0 - persistence))
    }
}

impl VolatilityEstimator for Garch11 {
    fn update(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.value();
        }
        let floor = self.min_volatility * self.min_volatility;
        let next = match self.sigma2 {
            None => self.init_sigma2.unwrap_or(value * value),
            Some(prev) => {
                self.omega + self.alpha * self.last_obs * self.last_obs + self.beta * prev
            }
        };
        self.sigma2 = Some(next.max(floor));
        self.last_obs = value;
        self.count += 1;
        self.value()
    }

    fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    fn reset(&mut self) {
        self.sigma2 = None;
        self.last_obs = 0.0;
        self.count = 0;
    }

    fn value(&self) -> f64 {
        match self.sigma2 {
            Some(s2) => s2.sqrt().max(self.min_volatility),
            None => f64::NAN,
        }
    }

    fn observation_count(&self) -> usize {
        self.count
    }

    fn name(&self) -> &'static str {
        "garch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn garch(init_sigma2: Option<f64>) -> Garch11 {
        Garch11::new(&GarchParams {
            omega: 0.1,
            alpha: 0.2,
            beta: 0.7,
            enforce_stationarity: true,
            init_sigma2,
            min_periods: 2,
            min_volatility: 1e-4,
        })
        .unwrap()
    }

    #[test]
    fn test_windowed_std_sample_variance() {
        let mut s = WindowedStd::new(&WindowedStdParams {
            window: 4,
            min_periods: None,
            ddof: 1,
            min_volatility: 0.0,
        })
        .unwrap();
        for v in [2.0, 4.0, 4.0] {
            s.update(v);
        }
        assert!(!s.is_ready());
        s.update(4.0);
        assert!(s.is_ready());
        // mean 3.5, squared deviations 2.25 + 3 * 0.25 = 3.0, / 3
        assert_relative_eq!(s.value(), 1.0, epsilon = 1e-12);

        // window rolls: [4, 4, 4, 4]
        assert_relative_eq!(s.update(4.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_windowed_std_population_variance() {
        let mut s = WindowedStd::new(&WindowedStdParams {
            window: 2,
            min_periods: None,
            ddof: 0,
            min_volatility: 0.0,
        })
        .unwrap();
        s.update(1.0);
        assert_relative_eq!(s.update(3.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_windowed_std_floor() {
        let mut s = WindowedStd::new(&WindowedStdParams {
            window: 3,
            min_periods: None,
            ddof: 1,
            min_volatility: 0.5,
        })
        .unwrap();
        assert_eq!(s.update(7.0), 0.5);
        assert_eq!(s.update(7.0), 0.5);
        assert_eq!(s.update(7.0), 0.5);
    }

    #[test]
    fn test_ewm_volatility_demeaned() {
        let mut v = EwmVolatility::new(&EwmVolatilityParams {
            span: 3.0,
            min_periods: 2,
            demean: true,
            min_volatility: 0.0,
        })
        .unwrap();
        assert_eq!(v.update(0.0), 0.0);
        assert!(!v.is_ready());
        // delta = 2, mean = 1, var = 0.5 * (0 + 0.5 * 4) = 1
        assert_relative_eq!(v.update(2.0), 1.0, epsilon = 1e-12);
        assert!(v.is_ready());
    }

    #[test]
    fn test_ewm_volatility_raw_squares() {
        let mut v = EwmVolatility::new(&EwmVolatilityParams {
            span: 3.0,
            min_periods: 1,
            demean: false,
            min_volatility: 0.0,
        })
        .unwrap();
        assert_relative_eq!(v.update(2.0), 2.0, epsilon = 1e-12);
        // 0.5 * 4 + 0.5 * 0 = 2
        assert_relative_eq!(v.update(0.0), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_garch_recursion() {
        let mut g = garch(None);
        assert_relative_eq!(g.update(1.0), 1.0, epsilon = 1e-12);
        assert!(!g.is_ready());
        // 0.1 + 0.2 * 1 + 0.7 * 1 = 1.0
        assert_relative_eq!(g.sigma2().unwrap(), 1.0, epsilon = 1e-12);
        g.update(3.0);
        assert_relative_eq!(g.sigma2().unwrap(), 1.0, epsilon = 1e-12);
        // now r_{t-1} = 3: 0.1 + 0.2 * 9 + 0.7 * 1 = 2.6
        g.update(0.0);
        assert_relative_eq!(g.sigma2().unwrap(), 2.6, epsilon = 1e-12);
        assert!(g.is_ready());
    }

    #[test]
    fn test_garch_init_sigma2_and_floor() {
        let mut g = garch(Some(4.0));
        assert_relative_eq!(g.update(0.0), 2.0, epsilon = 1e-12);

        let mut zero = garch(None);
        assert_eq!(zero.update(0.0), 1e-4);
    }

    #[test]
    fn test_garch_long_run_variance() {
        let g = garch(None);
        assert_relative_eq!(g.long_run_variance().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_garch_rejects_non_stationary() {
        let err = Garch11::new(&GarchParams {
            omega: 0.1,
            alpha: 0.5,
            beta: 0.5,
            enforce_stationarity: true,
            init_sigma2: None,
            min_periods: 1,
            min_volatility: 0.0,
        });
        assert!(err.is_err());
    }
}
