//! Factory functions: tagged config variant -> boxed trait object

use crate::error::Result;
use crate::ports::{
    DeviationDetector, FailureCriterion, MeanEstimator, ReversionCriterion, VolatilityEstimator,
};
use crate::strategy::criteria::{CompositeFailure, SoftBandReversion};
use crate::strategy::mean::{EwmaMean, KalmanMean, WindowedMean};
use crate::strategy::params::{
    DetectorConfig, FailureConfig, MeanEstimatorConfig, ReversionConfig,
    VolatilityEstimatorConfig,
};
use crate::strategy::volatility::{EwmVolatility, Garch11, WindowedStd};
use crate::strategy::zscore_gate::ZScoreGate;

pub fn build_mean_estimator(config: &MeanEstimatorConfig) -> Result<Box<dyn MeanEstimator>> {
    Ok(match config {
        MeanEstimatorConfig::Windowed(p) => Box::new(WindowedMean::new(p)?),
        MeanEstimatorConfig::Ewma(p) => Box::new(EwmaMean::new(p)?),
        MeanEstimatorConfig::Kalman(p) => Box::new(KalmanMean::new(p)?),
    })
}

pub fn build_volatility_estimator(
    config: &VolatilityEstimatorConfig,
) -> Result<Box<dyn VolatilityEstimator>> {
    Ok(match config {
        VolatilityEstimatorConfig::WindowedStd(p) => Box::new(WindowedStd::new(p)?),
        VolatilityEstimatorConfig::Ewm(p) => Box::new(EwmVolatility::new(p)?),
        VolatilityEstimatorConfig::Garch(p) => Box::new(Garch11::new(p)?),
    })
}

pub fn build_detector(config: &DetectorConfig) -> Result<Box<dyn DeviationDetector>> {
    Ok(match config {
        DetectorConfig::ZScore(p) => Box::new(ZScoreGate::new(p)?),
    })
}

pub fn build_reversion(config: &ReversionConfig) -> Result<Box<dyn ReversionCriterion>> {
    Ok(match config {
        ReversionConfig::SoftBand(p) => Box::new(SoftBandReversion::new(p)?),
    })
}

pub fn build_failure(config: &FailureConfig) -> Result<Box<dyn FailureCriterion>> {
    Ok(match config {
        FailureConfig::Composite(p) => Box::new(CompositeFailure::new(p)?),
    })
}

/// The five leaves the engine folds a series through
pub struct Leaves {
    pub mean: Box<dyn MeanEstimator>,
    pub volatility: Box<dyn VolatilityEstimator>,
    pub detector: Box<dyn DeviationDetector>,
    pub reversion: Box<dyn ReversionCriterion>,
    pub failure: Box<dyn FailureCriterion>,
}

impl Leaves {
    pub fn build(
        mean: &MeanEstimatorConfig,
        volatility: &VolatilityEstimatorConfig,
        detector: &DetectorConfig,
        reversion: &ReversionConfig,
        failure: &FailureConfig,
    ) -> Result<Self> {
        Ok(Self {
            mean: build_mean_estimator(mean)?,
            volatility: build_volatility_estimator(volatility)?,
            detector: build_detector(detector)?,
            reversion: build_reversion(reversion)?,
            failure: build_failure(failure)?,
        })
    }

    /// Clear estimator state between runs. Detector and criteria are stateless.
    pub fn reset(&mut self) {
        self.mean.reset();
        self.volatility.reset();
    }
}

impl std::fmt::Debug for Leaves {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leaves")
            .field("mean", &self.mean.name())
            .field("volatility", &self.volatility.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::params::{GarchParams, KalmanParams, WindowedMeanParams};

    #[test]
    fn test_build_each_mean_variant() {
        let m = build_mean_estimator(&MeanEstimatorConfig::Windowed(WindowedMeanParams {
            window: 5,
            min_periods: None,
        }))
        .unwrap();
        assert_eq!(m.name(), "windowed");
        assert_eq!(build_mean_estimator(&MeanEstimatorConfig::default()).unwrap().name(), "ewma");
        let k = build_mean_estimator(&MeanEstimatorConfig::Kalman(KalmanParams {
            process_var: 1.0,
            obs_var: 1.0,
            init_var: 1.0,
            init_value: None,
            min_periods: 1,
        }))
        .unwrap();
        assert_eq!(k.name(), "kalman");
    }

    #[test]
    fn test_build_propagates_validation() {
        let err = build_volatility_estimator(&VolatilityEstimatorConfig::Garch(GarchParams {
            omega: 0.0,
            alpha: 0.1,
            beta: 0.1,
            enforce_stationarity: true,
            init_sigma2: None,
            min_periods: 1,
            min_volatility: 0.0,
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_build_default_leaves() {
        let leaves = Leaves::build(
            &MeanEstimatorConfig::default(),
            &VolatilityEstimatorConfig::default(),
            &DetectorConfig::default(),
            &ReversionConfig::default(),
            &FailureConfig::default(),
        )
        .unwrap();
        assert_eq!(leaves.volatility.name(), "windowed_std");
        assert!(format!("{:?}", leaves).contains("ewma"));
    }
}
