//! Ports Layer - Trait definitions for the pluggable leaf algorithms
//!
//! The engine and the backtester only ever talk to these traits:
//! - Mean and volatility estimators (online, O(1) per update)
//! - Deviation detector
//! - Reversion and failure criteria
//!
//! Concrete implementations live in `strategy`; deterministic doubles for
//! tests live in `mocks`.

pub mod estimator;
pub mod criteria;
pub mod mocks;

pub use estimator::{MeanEstimator, VolatilityEstimator};
pub use criteria::{DeviationDetector, FailureCriterion, ReversionCriterion};
