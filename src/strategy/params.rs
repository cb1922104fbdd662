//! Strategy Parameters
//!
//! Validated parameter records for every leaf algorithm, and the tagged
//! unions that select one algorithm per role. In a config file each role
//! reads as `type = "<variant>"` plus a `params` table.

use serde::{Deserialize, Serialize};

use crate::error::{MrError, Result};

fn default_one() -> usize {
    1
}

fn default_init_var() -> f64 {
    1.0
}

fn default_ddof() -> usize {
    1
}

fn default_min_volatility() -> f64 {
    1e-12
}

fn default_true() -> bool {
    true
}

fn check_min_periods(min_periods: usize, window: usize) -> Result<()> {
    if min_periods < 1 {
        return Err(MrError::config("min_periods must be >= 1"));
    }
    if min_periods > window {
        return Err(MrError::config(format!(
            "min_periods ({}) must not exceed window ({})",
            min_periods, window
        )));
    }
    Ok(())
}

fn check_span(span: f64) -> Result<()> {
    if !(span.is_finite() && span >= 1.0) {
        return Err(MrError::config(format!("span must be >= 1, got {}", span)));
    }
    Ok(())
}

fn check_min_volatility(min_volatility: f64) -> Result<()> {
    if !(min_volatility.is_finite() && min_volatility >= 0.0) {
        return Err(MrError::config(format!(
            "min_volatility must be finite and >= 0, got {}",
            min_volatility
        )));
    }
    Ok(())
}

/// Arithmetic mean over the last `window` observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowedMeanParams {
    pub window: usize,
    /// Defaults to `window`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_periods: Option<usize>,
}

impl WindowedMeanParams {
    pub fn min_periods(&self) -> usize {
        self.min_periods.unwrap_or(self.window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window < 1 {
            return Err(MrError::config("window must be >= 1"));
        }
        check_min_periods(self.min_periods(), self.window)
    }
}

/// Exponentially weighted mean, `alpha = 2 / (span + 1)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EwmaMeanParams {
    pub span: f64,
    #[serde(default = "default_one")]
    pub min_periods: usize,
}

impl EwmaMeanParams {
    pub fn validate(&self) -> Result<()> {
        check_span(self.span)?;
        if self.min_periods < 1 {
            return Err(MrError::config("min_periods must be >= 1"));
        }
        Ok(())
    }
}

/// Constant-level Kalman filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KalmanParams {
    /// Process noise q
    pub process_var: f64,
    /// Observation noise r
    pub obs_var: f64,
    #[serde(default = "default_init_var")]
    pub init_var: f64,
    /// Starting level; the first observation when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_value: Option<f64>,
    #[serde(default = "default_one")]
    pub min_periods: usize,
}

impl KalmanParams {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("process_var", self.process_var),
            ("obs_var", self.obs_var),
            ("init_var", self.init_var),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(MrError::config(format!("{} must be > 0, got {}", name, v)));
            }
        }
        if let Some(x0) = self.init_value {
            if !x0.is_finite() {
                return Err(MrError::config("init_value must be finite"));
            }
        }
        if self.min_periods < 1 {
            return Err(MrError::config("min_periods must be >= 1"));
        }
        Ok(())
    }
}

/// Rolling standard deviation over a ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowedStdParams {
    pub window: usize,
    /// Defaults to `window`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_periods: Option<usize>,
    /// 0 = population, 1 = sample variance
    #[serde(default = "default_ddof")]
    pub ddof: usize,
    #[serde(default = "default_min_volatility")]
    pub min_volatility: f64,
}

impl WindowedStdParams {
    pub fn min_periods(&self) -> usize {
        self.min_periods.unwrap_or(self.window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window < 1 {
            return Err(MrError::config("window must be >= 1"));
        }
        if self.ddof > 1 {
            return Err(MrError::config(format!("ddof must be 0 or 1, got {}", self.ddof)));
        }
        check_min_periods(self.min_periods(), self.window)?;
        if self.min_periods() <= self.ddof {
            return Err(MrError::config(format!(
                "min_periods ({}) must exceed ddof ({})",
                self.min_periods(),
                self.ddof
            )));
        }
        check_min_volatility(self.min_volatility)
    }
}

/// Exponentially weighted volatility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EwmVolatilityParams {
    pub span: f64,
    #[serde(default = "default_one")]
    pub min_periods: usize,
    /// Measure dispersion around the running mean instead of around zero
    #[serde(default = "default_true")]
    pub demean: bool,
    #[serde(default = "default_min_volatility")]
    pub min_volatility: f64,
}

impl EwmVolatilityParams {
    pub fn validate(&self) -> Result<()> {
        check_span(self.span)?;
        if self.min_periods < 1 {
            return Err(MrError::config("min_periods must be >= 1"));
        }
        check_min_volatility(self.min_volatility)
    }
}

/// GARCH(1,1) conditional volatility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GarchParams {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    #[serde(default = "default_true")]
    pub enforce_stationarity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_sigma2: Option<f64>,
    #[serde(default = "default_one")]
    pub min_periods: usize,
    #[serde(default = "default_min_volatility")]
    pub min_volatility: f64,
}

impl GarchParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.omega.is_finite() && self.omega > 0.0) {
            return Err(MrError::config(format!("omega must be > 0, got {}", self.omega)));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(MrError::config(format!("alpha must be >= 0, got {}", self.alpha)));
        }
        if !(self.beta.is_finite() && self.beta >= 0.0) {
            return Err(MrError::config(format!("beta must be >= 0, got {}", self.beta)));
        }
        if self.enforce_stationarity && self.alpha + self.beta >= 1.0 {
            return Err(MrError::config(format!(
                "alpha + beta must be < 1 for a stationary GARCH(1,1), got {}",
                self.alpha + self.beta
            )));
        }
        if let Some(s2) = self.init_sigma2 {
            if !(s2.is_finite() && s2 > 0.0) {
                return Err(MrError::config(format!("init_sigma2 must be > 0, got {}", s2)));
            }
        }
        if self.min_periods < 1 {
            return Err(MrError::config("min_periods must be >= 1"));
        }
        check_min_volatility(self.min_volatility)
    }
}

/// Z-score threshold detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZScoreDetectorParams {
    pub threshold: f64,
    /// Ignore deviations whose absolute size `|value - mean|` is smaller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_abs_move: Option<f64>,
}

impl ZScoreDetectorParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(MrError::config(format!(
                "threshold must be > 0, got {}",
                self.threshold
            )));
        }
        if let Some(m) = self.min_abs_move {
            if !(m.is_finite() && m >= 0.0) {
                return Err(MrError::config(format!("min_abs_move must be >= 0, got {}", m)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoftBandParams {
    pub z_tolerance: f64,
}

impl SoftBandParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.z_tolerance.is_finite() && self.z_tolerance >= 0.0) {
            return Err(MrError::config(format!(
                "z_tolerance must be >= 0, got {}",
                self.z_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeFailureParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zscore: Option<f64>,
}

impl CompositeFailureParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_duration.is_none() && self.max_zscore.is_none() {
            return Err(MrError::config(
                "failure criterion needs max_duration or max_zscore",
            ));
        }
        if self.max_duration == Some(0) {
            return Err(MrError::config("max_duration must be >= 1"));
        }
        if let Some(z) = self.max_zscore {
            if !(z.is_finite() && z > 0.0) {
                return Err(MrError::config(format!("max_zscore must be > 0, got {}", z)));
            }
        }
        Ok(())
    }
}

/// Mean estimator selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum MeanEstimatorConfig {
    Windowed(WindowedMeanParams),
    Ewma(EwmaMeanParams),
    Kalman(KalmanParams),
}

impl Default for MeanEstimatorConfig {
    fn default() -> Self {
        MeanEstimatorConfig::Ewma(EwmaMeanParams {
            span: 20.0,
            min_periods: 20,
        })
    }
}

/// Volatility estimator selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum VolatilityEstimatorConfig {
    WindowedStd(WindowedStdParams),
    Ewm(EwmVolatilityParams),
    Garch(GarchParams),
}

impl Default for VolatilityEstimatorConfig {
    fn default() -> Self {
        VolatilityEstimatorConfig::WindowedStd(WindowedStdParams {
            window: 20,
            min_periods: None,
            ddof: 1,
            min_volatility: default_min_volatility(),
        })
    }
}

/// Deviation detector selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum DetectorConfig {
    ZScore(ZScoreDetectorParams),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::ZScore(ZScoreDetectorParams {
            threshold: 2.0,
            min_abs_move: None,
        })
    }
}

/// Reversion criterion selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum ReversionConfig {
    SoftBand(SoftBandParams),
}

impl Default for ReversionConfig {
    fn default() -> Self {
        ReversionConfig::SoftBand(SoftBandParams { z_tolerance: 0.5 })
    }
}

/// Failure criterion selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum FailureConfig {
    Composite(CompositeFailureParams),
}

impl Default for FailureConfig {
    fn default() -> Self {
        FailureConfig::Composite(CompositeFailureParams {
            max_duration: Some(60),
            max_zscore: Some(6.0),
        })
    }
}
