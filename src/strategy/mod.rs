//! Strategy Layer - Online estimators, detector and resolution criteria
//!
//! Concrete implementations of the `ports` traits:
//! - Mean estimators: windowed average, EWMA, Kalman filter
//! - Volatility estimators: windowed std, EWM volatility, GARCH(1,1)
//! - Z-score gate deviation detector
//! - Soft-band reversion and composite failure criteria
//!
//! `params` holds the validated parameter records and the tagged unions
//! that select one implementation per role; `factory` turns those into
//! boxed trait objects.

pub mod params;
pub mod mean;
pub mod volatility;
pub mod zscore_gate;
pub mod criteria;
pub mod factory;

pub use params::{
    CompositeFailureParams, DetectorConfig, EwmVolatilityParams, EwmaMeanParams, FailureConfig,
    GarchParams, KalmanParams, MeanEstimatorConfig, ReversionConfig, SoftBandParams,
    VolatilityEstimatorConfig, WindowedMeanParams, WindowedStdParams, ZScoreDetectorParams,
};
pub use mean::{EwmaMean, KalmanMean, WindowedMean};
pub use volatility::{EwmVolatility, Garch11, WindowedStd};
pub use zscore_gate::{zscore, ZScoreGate, ZScoreResult};
pub use criteria::{CompositeFailure, SoftBandReversion};
pub use factory::{
    build_detector, build_failure, build_mean_estimator, build_reversion,
    build_volatility_estimator, Leaves,
};
