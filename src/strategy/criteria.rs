//! Resolution criteria for active deviation events

use crate::error::Result;
use crate::ports::{FailureCriterion, ReversionCriterion};
use crate::strategy::params::{CompositeFailureParams, SoftBandParams};

/// Reverted once `|z| <= z_tolerance`
#[derive(Debug, Clone)]
pub struct SoftBandReversion {
    z_tolerance: f64,
}

impl SoftBandReversion {
    pub fn new(params: &SoftBandParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            z_tolerance: params.z_tolerance,
        })
    }
}

impl ReversionCriterion for SoftBandReversion {
    fn is_reverted(&self, zscore: f64) -> bool {
        zscore.abs() <= self.z_tolerance
    }
}

/// Failed on timeout or on an excessive deviation, whichever is configured
#[derive(Debug, Clone)]
pub struct CompositeFailure {
    max_duration: Option<usize>,
    max_zscore: Option<f64>,
}

impl CompositeFailure {
    pub fn new(params: &CompositeFailureParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            max_duration: params.max_duration,
            max_zscore: params.max_zscore,
        })
    }
}

impl FailureCriterion for CompositeFailure {
    fn is_failed(&self, duration: usize, zscore: f64) -> bool {
        let timed_out = self.max_duration.is_some_and(|max| duration > max);
        let blown_out = self.max_zscore.is_some_and(|max| zscore.abs() > max);
        timed_out || blown_out
    }
}
