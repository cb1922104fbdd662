//! mrscore - Streaming mean-reversion detection, scoring and backtesting
//!
//! Tracks deviation episodes of a series against online mean and volatility
//! estimates, scores how often they revert, and backtests a single-leg
//! rotation strategy over combinatorial basket ratio universes.
//!
//! # Modules
//!
//! - `domain`: Value objects (DeviationEvent, AlignedPanel, Trade, Portfolio, ScoreResult)
//! - `ports`: Trait abstractions (MeanEstimator, VolatilityEstimator, DeviationDetector, criteria)
//! - `strategy`: Leaf algorithms (Kalman, GARCH, EWMA, windowed, ZScoreGate) and factories
//! - `application`: Engine, RatioUniverse, RotationBacktester, UniverseRunner
//! - `config`: Configuration loading and validation
//! - `adapters`: CLI and JSON data files
//! - `error`: Error taxonomy

pub mod error;
pub mod domain;
pub mod ports;
pub mod strategy;
pub mod application;
pub mod config;
pub mod adapters;

pub use error::{MrError, Result};
pub use config::{load_config, MrConfig};
pub use application::{MeanReversionEngine, RatioUniverse, RotationBacktester, UniverseRunner};
